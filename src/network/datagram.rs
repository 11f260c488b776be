use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use super::{FrameReader, FrameWriter};
use crate::core::{Error, Result, MAX_DATAGRAM_SIZE};
use crate::util::resolve_unique;

/// Bound datagram socket that reads one datagram at a time
///
/// Reads are served from the datagram currently buffered; a new datagram is
/// received only once the buffered one is fully consumed.
pub struct DatagramEndpoint {
    /// Socket shared with every sender spawned from this endpoint
    socket: Arc<UdpSocket>,
    /// Scratch space for `recv_from`
    recv_buffer: Vec<u8>,
    /// Unread part of the current datagram
    pending: Bytes,
    /// Source of the current datagram
    peer: Option<SocketAddr>,
}

impl DatagramEndpoint {
    /// Binds a datagram socket on `addr`
    pub async fn bind(addr: &str) -> Result<Self> {
        let addr = resolve_unique(addr).await?;
        let bind_err = |source: std::io::Error| Error::Bind { addr, source };

        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let socket = UdpSocket::from_std(socket.into())?;
        debug!(%addr, "datagram endpoint bound");

        Ok(DatagramEndpoint {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
            pending: Bytes::new(),
            peer: None,
        })
    }

    /// Returns the bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Source address of the most recently received datagram
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Unread bytes left in the current datagram
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Drops whatever is left of the current datagram
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!(bytes = self.pending.len(), "discarding partially read datagram");
        }
        self.pending = Bytes::new();
    }

    /// Creates a send-only endpoint to `destination` sharing this socket
    pub fn sender(&self, destination: impl Into<String>) -> DatagramSender {
        DatagramSender {
            socket: Arc::clone(&self.socket),
            destination: destination.into(),
            buffer: BytesMut::new(),
            capacity: MAX_DATAGRAM_SIZE,
        }
    }

    /// Creates a send-only endpoint back to the source of the current datagram
    pub fn reply_sender(&self) -> Result<DatagramSender> {
        let peer = self
            .peer
            .ok_or_else(|| Error::resolve("<reply peer>", "no datagram received yet"))?;
        Ok(self.sender(peer.to_string()))
    }

    /// Waits for the next non-empty datagram and hands it over whole
    ///
    /// Whatever is left of the current datagram is dropped first. The
    /// returned buffer never refills, so a short datagram surfaces as
    /// [`Error::DatagramUnderRead`] instead of blocking on the next one.
    pub async fn receive(&mut self) -> Result<(Bytes, SocketAddr)> {
        self.discard();
        loop {
            let peer = self.fill().await?;
            if !self.pending.is_empty() {
                return Ok((std::mem::take(&mut self.pending), peer));
            }
            trace!(%peer, "ignoring empty datagram");
        }
    }

    /// Like [`receive`](Self::receive), but drops datagrams not sent by `expected`
    pub async fn receive_from(&mut self, expected: SocketAddr) -> Result<Bytes> {
        loop {
            let (datagram, peer) = self.receive().await?;
            if peer == expected {
                return Ok(datagram);
            }
            warn!(%peer, %expected, len = datagram.len(), "dropping datagram from unexpected peer");
        }
    }

    async fn fill(&mut self) -> Result<SocketAddr> {
        let (len, peer) = self.socket.recv_from(&mut self.recv_buffer).await?;
        trace!(%peer, len, "datagram received");
        self.pending = Bytes::copy_from_slice(&self.recv_buffer[..len]);
        self.peer = Some(peer);
        Ok(peer)
    }
}

impl FrameReader for DatagramEndpoint {
    async fn read(&mut self, n: usize) -> Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        if self.pending.is_empty() {
            self.fill().await?;
        }
        if n > self.pending.len() {
            let remaining = self.pending.len();
            self.pending = Bytes::new();
            return Err(Error::DatagramUnderRead {
                requested: n,
                remaining,
            });
        }
        Ok(self.pending.split_to(n))
    }
}

/// A datagram taken whole by [`DatagramEndpoint::receive`]
impl FrameReader for Bytes {
    async fn read(&mut self, n: usize) -> Result<Bytes> {
        if n > self.len() {
            let remaining = self.len();
            self.clear();
            return Err(Error::DatagramUnderRead {
                requested: n,
                remaining,
            });
        }
        Ok(self.split_to(n))
    }
}

/// Send-only datagram endpoint that coalesces writes into one datagram
pub struct DatagramSender {
    /// Socket borrowed from the owning endpoint
    socket: Arc<UdpSocket>,
    /// Destination, resolved on every flush
    destination: String,
    /// Outbound frame under construction
    buffer: BytesMut,
    /// Largest frame this sender will transmit
    capacity: usize,
}

impl DatagramSender {
    /// Lowers the frame capacity below [`MAX_DATAGRAM_SIZE`]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.min(MAX_DATAGRAM_SIZE);
        self
    }

    /// Destination this sender flushes to
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Bytes buffered for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl FrameWriter for DatagramSender {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let len = self.buffer.len() + bytes.len();
        if len > self.capacity {
            return Err(Error::Oversized {
                len,
                capacity: self.capacity,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let addr = resolve_unique(&self.destination).await?;
        let frame = self.buffer.split().freeze();
        let written = self.socket.send_to(&frame, addr).await?;
        trace!(%addr, len = frame.len(), "datagram sent");

        if written != frame.len() {
            return Err(Error::ShortWrite {
                expected: frame.len(),
                written,
            });
        }
        Ok(())
    }
}
