pub mod config;
pub mod error;
pub mod poller;
pub mod session;

pub use config::*;
pub use error::*;
pub use session::*;
