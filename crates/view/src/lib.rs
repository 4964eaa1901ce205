pub mod params;
pub mod query;
pub mod reconcile;
pub mod state;
pub mod store;
pub mod transition;

pub use params::*;
pub use query::*;
pub use state::*;
pub use store::*;
pub use transition::*;
