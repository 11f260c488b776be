use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::core::Result;
use crate::graph::MapRegistry;
use crate::network::DatagramEndpoint;
use crate::protocol::{read_message, Query, ShortestPathResult};

use super::respond;

/// Datagram service answering each [`Query`] with a [`ShortestPathResult`]
pub struct PathEngine {
    /// Bound endpoint, also used for replies
    endpoint: DatagramEndpoint,
    /// Maps loaded at startup
    maps: Arc<MapRegistry>,
}

impl PathEngine {
    /// Binds the engine on `addr`
    pub async fn bind(addr: &str, maps: Arc<MapRegistry>) -> Result<Self> {
        let endpoint = DatagramEndpoint::bind(addr).await?;
        Ok(PathEngine { endpoint, maps })
    }

    /// Returns the bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Serves queries until a process-fatal error occurs
    pub async fn run(&mut self) -> Result<()> {
        info!(addr = %self.local_addr()?, maps = self.maps.len(), "path engine is up and running");

        loop {
            if let Err(e) = self.serve_one().await {
                if !e.is_request_scoped() {
                    return Err(e);
                }
                warn!(error = %e, peer = ?self.endpoint.peer(), "query failed");
            }
        }
    }

    /// Receives one query, computes shortest paths and replies to its sender
    ///
    /// Failures are answered with their status before being returned.
    pub async fn serve_one(&mut self) -> Result<ShortestPathResult> {
        let (mut request, peer) = self.endpoint.receive().await?;
        let outcome = self.compute(&mut request, peer).await;
        respond(&self.endpoint, outcome).await
    }

    async fn compute(&self, request: &mut Bytes, peer: SocketAddr) -> Result<ShortestPathResult> {
        let query: Query = read_message(request).await?;
        info!(
            %peer,
            map = %query.map,
            source = query.source,
            "received query for shortest paths"
        );

        let result = self.maps.shortest_paths(query.map, query.source)?;
        info!(
            map = %query.map,
            source = query.source,
            destinations = result.distances.len(),
            "shortest paths computed"
        );
        Ok(result)
    }
}
