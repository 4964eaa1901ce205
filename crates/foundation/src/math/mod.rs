pub mod mercator;
pub mod precision;

pub use mercator::*;
pub use precision::*;
