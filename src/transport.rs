//! Transport layer for client connections
//!
//! The transport layer is organized into:
//! - `codec`: line parsing and serialization for protocol messages
//! - `async_transport`: tokio-based line reader/writer over any stream halves

use thiserror::Error;

mod async_transport;
mod codec;

pub use async_transport::AsyncConnection;
pub(crate) use async_transport::{read_message, write_message};
pub use codec::{decode_message, encode_message};

/// Default TCP address the server listens on
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:6667";

/// Line terminator appended to every outgoing message
pub const LINE_TERMINATOR: &str = "\r\n";

/// Capacity of the inbound and outbound queues of a session
pub const QUEUE_CAPACITY: usize = 20;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed message: {0}")]
    Parse(String),
    #[error("Connection closed")]
    Closed,
}
