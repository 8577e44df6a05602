pub mod connection;
pub mod document;

pub use connection::*;
pub use document::*;
