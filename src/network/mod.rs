//! Framing transport module
//!
//! Every role talks through two small capabilities: reading exactly `n`
//! bytes and writing bytes that become visible on `flush`. The concrete
//! variant is chosen when the endpoint is constructed:
//!
//! - [`StreamTransport`]: a connected stream, readable and writable, where
//!   writes go out immediately and `flush` does nothing extra.
//! - [`DatagramEndpoint`]: a bound datagram socket that reads one datagram at
//!   a time into an internal buffer.
//! - [`DatagramSender`]: a send-only view of a [`DatagramEndpoint`]'s socket
//!   that coalesces writes and transmits them as one datagram on `flush`.

mod datagram;
mod stream;

pub use self::datagram::{DatagramEndpoint, DatagramSender};
pub use self::stream::{connect, StreamListener, StreamTransport};

use std::future::Future;

use bytes::Bytes;

use crate::core::Result;

/// Reads framed bytes from a transport
pub trait FrameReader: Send {
    /// Blocks until exactly `n` bytes are available and returns them
    fn read(&mut self, n: usize) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Writes framed bytes to a transport
pub trait FrameWriter: Send {
    /// Queues or sends `bytes`, depending on the transport
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Makes everything written so far visible to the peer as one unit
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;
}
