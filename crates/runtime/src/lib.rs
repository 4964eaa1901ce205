pub mod event_queue;
pub mod metrics;

pub use event_queue::*;
pub use metrics::*;
