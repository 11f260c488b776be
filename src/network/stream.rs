use std::net::SocketAddr;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use super::{FrameReader, FrameWriter};
use crate::core::{Error, Result, CONNECTION_LIMIT};
use crate::util::resolve_unique;

/// Connection-mode transport over any byte stream
pub struct StreamTransport<S = TcpStream> {
    /// Underlying stream
    inner: S,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream
    pub fn new(inner: S) -> Self {
        StreamTransport { inner }
    }

    /// Returns the underlying stream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> FrameReader for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; n];
        let mut received = 0;

        while received < n {
            let got = self.inner.read(&mut buf[received..]).await?;
            if got == 0 {
                return Err(Error::ShortRead { expected: n, received });
            }
            received += got;
        }

        Ok(Bytes::from(buf))
    }
}

impl<S> FrameWriter for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < bytes.len() {
            let sent = self.inner.write(&bytes[written..]).await?;
            if sent == 0 {
                return Err(Error::ShortWrite {
                    expected: bytes.len(),
                    written,
                });
            }
            written += sent;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }
}

/// Listener that keeps a single pending connection
pub struct StreamListener {
    /// Bound listener
    listener: TcpListener,
}

impl StreamListener {
    /// Binds `addr` with a backlog of [`CONNECTION_LIMIT`]
    pub async fn bind(addr: &str) -> Result<Self> {
        let addr = resolve_unique(addr).await?;
        let bind_err = |source: std::io::Error| Error::Bind { addr, source };

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket
            .listen(CONNECTION_LIMIT)
            .map_err(|source| Error::Listen { addr, source })?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let listener = TcpListener::from_std(socket.into())?;
        debug!(%addr, backlog = CONNECTION_LIMIT, "stream listener bound");

        Ok(StreamListener { listener })
    }

    /// Waits for the next connection
    pub async fn accept(&self) -> Result<(StreamTransport<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((StreamTransport::new(stream), peer))
    }

    /// Returns the bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Opens a connection-mode transport to `addr`
pub async fn connect(addr: &str) -> Result<StreamTransport<TcpStream>> {
    let addr = resolve_unique(addr).await?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| Error::Connect { addr, source })?;
    Ok(StreamTransport::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_across_partial_receives() {
        let mock = Builder::new().read(b"ab").read(b"cde").read(b"f").build();
        let mut transport = StreamTransport::new(mock);

        assert_eq!(&transport.read(4).await.unwrap()[..], b"abcd");
        assert_eq!(&transport.read(2).await.unwrap()[..], b"ef");
    }

    #[tokio::test]
    async fn test_short_read_on_close() {
        let mock = Builder::new().read(b"abc").build();
        let mut transport = StreamTransport::new(mock);

        let err = transport.read(8).await.unwrap_err();
        assert!(matches!(err, Error::ShortRead { expected: 8, received: 3 }));
    }

    #[tokio::test]
    async fn test_write_is_immediate() {
        let mock = Builder::new().write(b"hello").write(b"!").build();
        let mut transport = StreamTransport::new(mock);

        transport.write(b"hello").await.unwrap();
        transport.write(b"!").await.unwrap();
        transport.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_round_trip() {
        let listener = StreamListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut conn = connect(&addr.to_string()).await.unwrap();
            conn.write(b"ping").await.unwrap();
            conn.flush().await.unwrap();
            conn.read(4).await.unwrap()
        });

        let (mut conn, _peer) = listener.accept().await.unwrap();
        assert_eq!(&conn.read(4).await.unwrap()[..], b"ping");
        conn.write(b"pong").await.unwrap();

        assert_eq!(&client.await.unwrap()[..], b"pong");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then close it again
        let addr = {
            let listener = StreamListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = connect(&addr.to_string()).await.err().unwrap();
        assert!(matches!(err, Error::Connect { .. }));
    }
}
