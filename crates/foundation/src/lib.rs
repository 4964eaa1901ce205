pub mod geo;
pub mod math;
pub mod time;

// Map geometry, Web-Mercator projection and time ranges shared by every crate.
pub use geo::*;
pub use time::*;
