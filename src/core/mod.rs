//! Core types for the path/delay services
//!
//! This module contains the error taxonomy, identifier types and the
//! configuration shared by the requester, relay and both engines.

pub mod error;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{Config, Distance, FileSize, MapId, ReplyMode, Seconds, VertexId};

/// Host every role uses by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default datagram port of the path engine
pub const PATH_ENGINE_PORT: u16 = 21943;

/// Default datagram port of the delay engine
pub const DELAY_ENGINE_PORT: u16 = 22943;

/// Default datagram port of the relay
pub const RELAY_DATAGRAM_PORT: u16 = 23943;

/// Default stream port of the relay
pub const RELAY_STREAM_PORT: u16 = 24943;

/// Maximum datagram payload in bytes
pub const MAX_DATAGRAM_SIZE: usize = 65507; // Maximum UDP payload size

/// Pending connections the relay listener keeps
pub const CONNECTION_LIMIT: i32 = 1;

/// Bits per byte, for file size conversion
pub const BITS_PER_BYTE: f64 = 8.0;
