use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::core::{FileSize, Result};
use crate::network::DatagramEndpoint;
use crate::protocol::{read_message, Delay, DelayResult, Query, ShortestPathResult};

use super::respond;

/// Transmission and propagation delay towards every destination of `paths`
///
/// Speeds are taken as given; maps with non-positive speeds are rejected
/// when they are loaded.
pub fn compute_delays(file_size: FileSize, paths: &ShortestPathResult) -> DelayResult {
    DelayResult {
        delays: paths
            .distances
            .iter()
            .map(|(&vertex, &distance)| (vertex, Delay::new(file_size, &paths.map, distance)))
            .collect(),
    }
}

/// Datagram service answering a [`Query`] plus [`ShortestPathResult`] with a [`DelayResult`]
pub struct DelayEngine {
    endpoint: DatagramEndpoint,
}

impl DelayEngine {
    /// Binds the engine on `addr`
    pub async fn bind(addr: &str) -> Result<Self> {
        let endpoint = DatagramEndpoint::bind(addr).await?;
        Ok(DelayEngine { endpoint })
    }

    /// Returns the bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Serves requests until a process-fatal error occurs
    pub async fn run(&mut self) -> Result<()> {
        info!(addr = %self.local_addr()?, "delay engine is up and running");

        loop {
            if let Err(e) = self.serve_one().await {
                if !e.is_request_scoped() {
                    return Err(e);
                }
                warn!(error = %e, peer = ?self.endpoint.peer(), "delay request failed");
            }
        }
    }

    /// Receives one request, computes delays and replies to its sender
    pub async fn serve_one(&mut self) -> Result<DelayResult> {
        let (mut request, peer) = self.endpoint.receive().await?;
        let outcome = Self::compute(&mut request, peer).await;
        respond(&self.endpoint, outcome).await
    }

    async fn compute(request: &mut Bytes, peer: SocketAddr) -> Result<DelayResult> {
        // Query and paths share one datagram
        let query: Query = read_message(request).await?;
        let paths: ShortestPathResult = read_message(request).await?;
        info!(
            %peer,
            map = %paths.map.id,
            propagation_speed = paths.map.propagation_speed,
            transmission_speed = paths.map.transmission_speed,
            file_size = query.file_size,
            destinations = paths.distances.len(),
            "received data for delay calculation"
        );

        let delays = compute_delays(query.file_size, &paths);
        for (vertex, delay) in &delays.delays {
            debug!(
                destination = vertex,
                transmission = delay.transmission,
                propagation = delay.propagation,
                total = delay.total(),
                "delay computed"
            );
        }
        Ok(delays)
    }
}
