use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use super::types::{MapId, VertexId};

/// Custom error types for the path/delay services
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to resolve address {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("Address {addr} resolved to {count} candidates, expected exactly one")]
    AmbiguousAddress { addr: String, count: usize },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Payload of {len} bytes exceeds datagram capacity of {capacity} bytes")]
    Oversized { len: usize, capacity: usize },

    #[error("Short write: sent {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("Short read: peer closed after {received} of {expected} bytes")]
    ShortRead { expected: usize, received: usize },

    #[error("Datagram under-read: {requested} bytes requested, {remaining} remaining")]
    DatagramUnderRead { requested: usize, remaining: usize },

    #[error("Malformed {kind}: {reason}")]
    Malformed { kind: &'static str, reason: String },

    #[error("Engine at {engine} failed to serve the request")]
    EngineFailed { engine: String },

    #[error("Map not found: {0}")]
    MapNotFound(MapId),

    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),

    #[error("Result mismatch: no delay for {missing_delay:?}, no distance for {missing_distance:?}")]
    ResultMismatch {
        missing_delay: Vec<VertexId>,
        missing_distance: Vec<VertexId>,
    },

    #[error("Map file error at line {line}: {reason}")]
    MapFormat { line: usize, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new resolution error
    pub fn resolve(addr: impl Into<String>, reason: impl ToString) -> Self {
        Error::Resolve {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new malformed message error
    pub fn malformed(kind: &'static str, reason: impl ToString) -> Self {
        Error::Malformed {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Creates a new map file format error
    pub fn map_format(line: usize, reason: impl Into<String>) -> Self {
        Error::MapFormat {
            line,
            reason: reason.into(),
        }
    }

    /// Creates a new invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether the error aborts only the exchange in progress.
    ///
    /// Transport and domain failures end the current request; the service
    /// goes on to the next one. Everything else happens at startup and ends
    /// the process.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Resolve { .. }
                | Error::AmbiguousAddress { .. }
                | Error::Connect { .. }
                | Error::Oversized { .. }
                | Error::ShortWrite { .. }
                | Error::ShortRead { .. }
                | Error::DatagramUnderRead { .. }
                | Error::Malformed { .. }
                | Error::EngineFailed { .. }
                | Error::MapNotFound(_)
                | Error::VertexNotFound(_)
                | Error::ResultMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::map_format(7, "expected 3 tokens");
        assert!(matches!(err, Error::MapFormat { line: 7, .. }));
        assert_eq!(
            err.to_string(),
            "Map file error at line 7: expected 3 tokens"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_domain_errors_carry_key() {
        let map = MapId::new('Z').unwrap();
        assert_eq!(Error::MapNotFound(map).to_string(), "Map not found: Z");
        assert_eq!(Error::VertexNotFound(42).to_string(), "Vertex not found: 42");
    }

    #[test]
    fn test_request_scope() {
        assert!(Error::DatagramUnderRead { requested: 8, remaining: 2 }.is_request_scoped());
        assert!(Error::VertexNotFound(1).is_request_scoped());
        assert!(Error::malformed("query", "bad map id").is_request_scoped());
        assert!(Error::EngineFailed { engine: "127.0.0.1:1".into() }.is_request_scoped());
        assert!(!Error::map_format(1, "bad").is_request_scoped());
        assert!(!Error::config("bad").is_request_scoped());
        let bind = Error::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(!bind.is_request_scoped());
    }
}
