pub mod heatmap;
pub mod index;
pub mod kd;
pub mod marker;
pub mod point;
pub mod spiderfy;

pub use heatmap::*;
pub use index::*;
pub use marker::*;
pub use point::*;
pub use spiderfy::*;
