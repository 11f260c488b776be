//! pathdelay: shortest paths and transfer delays behind a relay
//!
//! A requester asks the relay, over a stream connection, for the delays of
//! sending a file from one vertex of a map to every other vertex. The relay
//! asks the path engine for shortest distances and the delay engine for
//! transmission and propagation delays, both over datagrams, then replies.
pub mod client;
pub mod core;
pub mod engine;
pub mod graph;
pub mod network;
pub mod protocol;
pub mod relay;
mod util;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
