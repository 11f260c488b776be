//! Relay module
//!
//! The relay accepts one requester connection at a time and walks it through
//! a fixed pipeline: read the query, ask the path engine, ask the delay
//! engine, reply. Both engines are reached through one shared datagram
//! endpoint; sends and receives strictly alternate, and only datagrams from
//! the engine just contacted are taken as its reply.

use std::net::SocketAddr;

use tracing::{debug, info, warn};

use crate::core::{Config, Result, ReplyMode};
use crate::network::{DatagramEndpoint, FrameReader, FrameWriter, StreamListener};
use crate::protocol::{
    read_message, send_message, write_message, CombinedResult, DelayResult, Query, ReplyStatus,
    ShortestPathResult, WireMessage,
};
use crate::util::resolve_unique;

/// Progress of one request through the relay
#[derive(Debug)]
pub enum RelayState {
    /// Waiting for the requester's query
    AwaitQuery,

    /// Query received, path engine not asked yet
    ForwardToPathEngine {
        /// Query being served
        query: Query,
    },

    /// Shortest paths known, delay engine not asked yet
    ForwardToDelayEngine {
        /// Query being served
        query: Query,
        /// Path engine's answer
        paths: ShortestPathResult,
    },

    /// Both engines answered
    Reply {
        /// Path engine's answer
        paths: ShortestPathResult,
        /// Delay engine's answer
        delays: DelayResult,
    },

    /// Reply sent
    Done,
}

impl RelayState {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            RelayState::AwaitQuery => "AwaitQuery",
            RelayState::ForwardToPathEngine { .. } => "ForwardToPathEngine",
            RelayState::ForwardToDelayEngine { .. } => "ForwardToDelayEngine",
            RelayState::Reply { .. } => "Reply",
            RelayState::Done => "Done",
        }
    }
}

/// Sequential relay between requesters and the two engines
pub struct Relay {
    /// Requester-facing listener
    listener: StreamListener,
    /// Engine-facing endpoint, shared by every send and receive
    endpoint: DatagramEndpoint,
    /// Path engine datagram address
    path_engine: String,
    /// Delay engine datagram address
    delay_engine: String,
    /// Reply shape
    reply_mode: ReplyMode,
}

impl Relay {
    /// Binds both relay endpoints as configured
    pub async fn bind(config: &Config) -> Result<Self> {
        config.validate()?;

        let listener = StreamListener::bind(&config.relay_stream_addr()).await?;
        let endpoint = DatagramEndpoint::bind(&config.relay_datagram_addr()).await?;

        Ok(Relay {
            listener,
            endpoint,
            path_engine: config.path_engine_addr(),
            delay_engine: config.delay_engine_addr(),
            reply_mode: config.reply_mode,
        })
    }

    /// Address requesters connect to
    pub fn stream_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Address the engines see requests coming from
    pub fn datagram_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Serves requesters one after another until a process-fatal error occurs
    pub async fn run(&mut self) -> Result<()> {
        info!(
            stream = %self.stream_addr()?,
            datagram = %self.datagram_addr()?,
            reply_mode = ?self.reply_mode,
            "relay is up and running"
        );

        loop {
            self.serve_next().await?;
        }
    }

    /// Accepts one requester and serves it to completion
    ///
    /// Request-scoped failures close that connection only.
    pub async fn serve_next(&mut self) -> Result<()> {
        let Some((mut conn, peer)) = accepted(self.listener.accept().await)? else {
            return Ok(());
        };
        debug!(%peer, "requester connected");

        match self.serve(&mut conn).await {
            Ok(()) => {
                info!(%peer, "request served");
                Ok(())
            }
            Err(e) if e.is_request_scoped() => {
                warn!(%peer, error = %e, "request aborted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Runs the pipeline for one request on an accepted connection
    pub async fn serve<C>(&mut self, conn: &mut C) -> Result<()>
    where
        C: FrameReader + FrameWriter,
    {
        let mut state = RelayState::AwaitQuery;
        loop {
            state = self.step(state, conn).await?;
            if matches!(state, RelayState::Done) {
                return Ok(());
            }
        }
    }

    async fn step<C>(&mut self, state: RelayState, conn: &mut C) -> Result<RelayState>
    where
        C: FrameReader + FrameWriter,
    {
        debug!(state = state.name(), "relay step");

        let next = match state {
            RelayState::AwaitQuery => {
                let query: Query = read_message(conn).await?;
                info!(
                    map = %query.map,
                    source = query.source,
                    file_size = query.file_size,
                    "received query from requester"
                );
                RelayState::ForwardToPathEngine { query }
            }

            RelayState::ForwardToPathEngine { query } => {
                let engine = resolve_unique(&self.path_engine).await?;
                let mut sender = self.endpoint.sender(engine.to_string());
                send_message(&mut sender, &query).await?;
                info!(path_engine = %engine, "sent map id and source vertex to path engine");

                let paths: ShortestPathResult = self.engine_reply(engine).await?;
                info!(destinations = paths.distances.len(), "received shortest paths");
                RelayState::ForwardToDelayEngine { query, paths }
            }

            RelayState::ForwardToDelayEngine { query, paths } => {
                // Query and paths travel in a single datagram
                let engine = resolve_unique(&self.delay_engine).await?;
                let mut sender = self.endpoint.sender(engine.to_string());
                write_message(&mut sender, &query).await?;
                write_message(&mut sender, &paths).await?;
                sender.flush().await?;
                info!(delay_engine = %engine, "sent file size and shortest paths to delay engine");

                let delays: DelayResult = self.engine_reply(engine).await?;
                info!(destinations = delays.delays.len(), "received delays");
                RelayState::Reply { paths, delays }
            }

            RelayState::Reply { paths, delays } => {
                match self.reply_mode {
                    ReplyMode::Delay => send_message(conn, &delays).await?,
                    ReplyMode::Combined => {
                        let combined = CombinedResult::join(&paths, &delays)?;
                        send_message(conn, &combined).await?
                    }
                }
                info!("sent result to requester");
                RelayState::Done
            }

            RelayState::Done => RelayState::Done,
        };

        Ok(next)
    }

    /// Waits for `engine`'s reply and decodes it, turning a failure status into its error
    async fn engine_reply<M: WireMessage>(&mut self, engine: SocketAddr) -> Result<M> {
        let mut reply = self.endpoint.receive_from(engine).await?;
        let status: ReplyStatus = read_message(&mut reply).await?;
        status.into_result(&engine.to_string())?;

        let result = read_message(&mut reply).await?;
        if !reply.is_empty() {
            debug!(%engine, bytes = reply.len(), "ignoring trailing reply bytes");
        }
        Ok(result)
    }
}

/// Splits accept failures worth waiting past from fatal ones
///
/// A requester giving up while queued surfaces here as an I/O error.
fn accepted<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(conn) => Ok(Some(conn)),
        Err(e) if e.is_request_scoped() => {
            warn!(error = %e, "accept failed");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Error, MapId};
    use crate::network::StreamTransport;
    use crate::protocol::{Delay, MapInfo};

    fn config(path_engine: SocketAddr, delay_engine: SocketAddr, reply_mode: ReplyMode) -> Config {
        Config {
            path_engine_port: path_engine.port(),
            delay_engine_port: delay_engine.port(),
            relay_datagram_port: 0,
            relay_stream_port: 0,
            reply_mode,
            ..Default::default()
        }
    }

    fn query() -> Query {
        Query {
            map: MapId::new('A').unwrap(),
            source: 1,
            file_size: 800,
        }
    }

    fn paths(vertices: &[i64]) -> ShortestPathResult {
        let mut paths = ShortestPathResult::new(
            MapInfo {
                id: MapId::new('A').unwrap(),
                propagation_speed: 2.0,
                transmission_speed: 100.0,
            },
            1,
        );
        for &v in vertices {
            paths.distances.insert(v, v * 5);
        }
        paths
    }

    /// Sends an ok status and `result` back to the current datagram's source
    async fn reply_ok<M: WireMessage>(engine: &DatagramEndpoint, result: &M) {
        let mut reply = engine.reply_sender().unwrap();
        write_message(&mut reply, &ReplyStatus::Ok).await.unwrap();
        write_message(&mut reply, result).await.unwrap();
        reply.flush().await.unwrap();
    }

    /// Answers one path request and one delay request with canned results
    async fn fake_engines(
        mut path_engine: DatagramEndpoint,
        mut delay_engine: DatagramEndpoint,
        delay_vertices: Vec<i64>,
    ) -> (Query, Query, ShortestPathResult) {
        let (mut request, _) = path_engine.receive().await.unwrap();
        let to_path: Query = read_message(&mut request).await.unwrap();
        reply_ok(&path_engine, &paths(&[2, 3])).await;

        let (mut request, _) = delay_engine.receive().await.unwrap();
        let to_delay: Query = read_message(&mut request).await.unwrap();
        let forwarded: ShortestPathResult = read_message(&mut request).await.unwrap();
        assert!(request.is_empty());
        let delays = DelayResult {
            delays: delay_vertices
                .into_iter()
                .map(|v| (v, Delay { transmission: 1.0, propagation: 0.5 }))
                .collect(),
        };
        reply_ok(&delay_engine, &delays).await;

        (to_path, to_delay, forwarded)
    }

    async fn setup(
        reply_mode: ReplyMode,
        delay_vertices: Vec<i64>,
    ) -> (Relay, tokio::task::JoinHandle<(Query, Query, ShortestPathResult)>) {
        let path_engine = DatagramEndpoint::bind("127.0.0.1:0").await.unwrap();
        let delay_engine = DatagramEndpoint::bind("127.0.0.1:0").await.unwrap();
        let relay = Relay::bind(&config(
            path_engine.local_addr().unwrap(),
            delay_engine.local_addr().unwrap(),
            reply_mode,
        ))
        .await
        .unwrap();
        let engines = tokio::spawn(fake_engines(path_engine, delay_engine, delay_vertices));
        (relay, engines)
    }

    #[tokio::test]
    async fn test_pipeline_combined_reply() {
        let (mut relay, engines) = setup(ReplyMode::Combined, vec![2, 3]).await;

        let (requester, conn) = tokio::io::duplex(4096);
        let mut requester = StreamTransport::new(requester);
        let mut conn = StreamTransport::new(conn);
        send_message(&mut requester, &query()).await.unwrap();

        relay.serve(&mut conn).await.unwrap();
        let reply: CombinedResult = read_message(&mut requester).await.unwrap();

        let (to_path, to_delay, forwarded) = engines.await.unwrap();
        assert_eq!(to_path, query());
        assert_eq!(to_delay, query());
        assert_eq!(forwarded, paths(&[2, 3]));

        assert_eq!(reply.entries.len(), 2);
        assert_eq!(reply.entries[&3].distance, 15);
        assert_eq!(reply.entries[&3].transmission, 1.0);
    }

    #[tokio::test]
    async fn test_pipeline_delay_reply() {
        let (mut relay, engines) = setup(ReplyMode::Delay, vec![2, 3]).await;

        let (requester, conn) = tokio::io::duplex(4096);
        let mut requester = StreamTransport::new(requester);
        let mut conn = StreamTransport::new(conn);
        send_message(&mut requester, &query()).await.unwrap();

        relay.serve(&mut conn).await.unwrap();
        let reply: DelayResult = read_message(&mut requester).await.unwrap();
        engines.await.unwrap();

        assert_eq!(reply.delays.len(), 2);
        assert_eq!(reply.delays[&2].propagation, 0.5);
    }

    #[tokio::test]
    async fn test_join_mismatch_aborts_request() {
        let (mut relay, engines) = setup(ReplyMode::Combined, vec![2, 4]).await;

        let (requester, conn) = tokio::io::duplex(4096);
        let mut requester = StreamTransport::new(requester);
        let mut conn = StreamTransport::new(conn);
        send_message(&mut requester, &query()).await.unwrap();

        let err = relay.serve(&mut conn).await.unwrap_err();
        engines.await.unwrap();
        assert!(matches!(err, Error::ResultMismatch { .. }));
        assert!(err.is_request_scoped());
    }

    #[tokio::test]
    async fn test_requester_hangs_up_before_query() {
        let (mut relay, engines) = setup(ReplyMode::Combined, vec![2, 3]).await;

        let (requester, conn) = tokio::io::duplex(64);
        drop(requester);
        let mut conn = StreamTransport::new(conn);

        let err = relay.serve(&mut conn).await.unwrap_err();
        assert!(matches!(err, Error::ShortRead { received: 0, .. }));
        engines.abort();
    }

    #[tokio::test]
    async fn test_engine_failure_status_aborts_request() {
        let mut path_engine = DatagramEndpoint::bind("127.0.0.1:0").await.unwrap();
        let delay_engine = DatagramEndpoint::bind("127.0.0.1:0").await.unwrap();
        let mut relay = Relay::bind(&config(
            path_engine.local_addr().unwrap(),
            delay_engine.local_addr().unwrap(),
            ReplyMode::Combined,
        ))
        .await
        .unwrap();

        let engine = tokio::spawn(async move {
            path_engine.receive().await.unwrap();
            let mut reply = path_engine.reply_sender().unwrap();
            send_message(&mut reply, &ReplyStatus::VertexNotFound(1)).await.unwrap();
        });

        let (requester, conn) = tokio::io::duplex(4096);
        let mut requester = StreamTransport::new(requester);
        let mut conn = StreamTransport::new(conn);
        send_message(&mut requester, &query()).await.unwrap();

        let err = relay.serve(&mut conn).await.unwrap_err();
        engine.await.unwrap();
        assert!(matches!(err, Error::VertexNotFound(1)));
        assert!(err.is_request_scoped());
    }

    #[tokio::test]
    async fn test_stray_datagram_is_not_a_reply() {
        let (mut relay, engines) = setup(ReplyMode::Delay, vec![2, 3]).await;
        let relay_datagram = relay.datagram_addr().unwrap().to_string();

        // Garbage from a third party lands before the path engine's reply
        let stranger = DatagramEndpoint::bind("127.0.0.1:0").await.unwrap();
        let mut stray = stranger.sender(relay_datagram);
        stray.write(&[0xff; 16]).await.unwrap();
        stray.flush().await.unwrap();

        let (requester, conn) = tokio::io::duplex(4096);
        let mut requester = StreamTransport::new(requester);
        let mut conn = StreamTransport::new(conn);
        send_message(&mut requester, &query()).await.unwrap();

        relay.serve(&mut conn).await.unwrap();
        let reply: DelayResult = read_message(&mut requester).await.unwrap();
        engines.await.unwrap();
        assert_eq!(reply.delays.len(), 2);
    }

    #[test]
    fn test_accept_failures() {
        let aborted = Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionAborted));
        assert!(matches!(accepted::<()>(Err(aborted)), Ok(None)));
        assert!(matches!(accepted(Ok(7)), Ok(Some(7))));
        assert!(matches!(
            accepted::<()>(Err(Error::config("bad"))),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RelayState::AwaitQuery.name(), "AwaitQuery");
        assert_eq!(
            RelayState::ForwardToPathEngine { query: query() }.name(),
            "ForwardToPathEngine"
        );
        assert_eq!(RelayState::Done.name(), "Done");
    }
}
