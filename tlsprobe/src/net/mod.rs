//! Sockets and the record layer.

pub mod connection;
pub mod stream;
pub mod transport;

pub use connection::Connection;
pub use stream::{MemoryStream, Stream};
pub use transport::{RecordTransport, Response, Until};
