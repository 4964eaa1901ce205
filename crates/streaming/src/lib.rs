pub mod backend;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod request;

pub use backend::*;
pub use http::*;
pub use memory::*;
pub use protocol::*;
pub use request::*;
