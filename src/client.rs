//! Requester side of the relay protocol

use tracing::{debug, info};

use crate::core::{Config, Distance, Result, ReplyMode, Seconds, VertexId};
use crate::network::connect;
use crate::protocol::{read_message, send_message, CombinedResult, DelayResult, Query};

/// What the relay sent back
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Delays only
    Delays(DelayResult),
    /// Distances and delays
    Combined(CombinedResult),
}

/// One destination of a [`Reply`], flattened for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplyRow {
    pub destination: VertexId,
    /// Known only for combined replies
    pub distance: Option<Distance>,
    pub transmission: Seconds,
    pub propagation: Seconds,
}

impl ReplyRow {
    /// End-to-end delay
    pub fn total(&self) -> Seconds {
        self.transmission + self.propagation
    }
}

impl Reply {
    /// Rows in destination order
    pub fn rows(&self) -> Vec<ReplyRow> {
        match self {
            Reply::Delays(result) => result
                .delays
                .iter()
                .map(|(&destination, delay)| ReplyRow {
                    destination,
                    distance: None,
                    transmission: delay.transmission,
                    propagation: delay.propagation,
                })
                .collect(),
            Reply::Combined(result) => result
                .entries
                .iter()
                .map(|(&destination, entry)| ReplyRow {
                    destination,
                    distance: Some(entry.distance),
                    transmission: entry.transmission,
                    propagation: entry.propagation,
                })
                .collect(),
        }
    }
}

/// Sends queries to the relay, one connection per query
#[derive(Debug, Clone)]
pub struct Requester {
    /// Relay stream address
    relay: String,
    /// Reply shape the relay is configured for
    reply_mode: ReplyMode,
}

impl Requester {
    /// Creates a requester for the relay at `relay`
    pub fn new(relay: impl Into<String>, reply_mode: ReplyMode) -> Self {
        Requester {
            relay: relay.into(),
            reply_mode,
        }
    }

    /// Creates a requester from the shared configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.relay_stream_addr(), config.reply_mode)
    }

    /// Sends `query` and waits for the relay's reply
    pub async fn query(&self, query: &Query) -> Result<Reply> {
        let mut conn = connect(&self.relay).await?;
        debug!(relay = %self.relay, "connected to relay");

        send_message(&mut conn, query).await?;
        info!(
            map = %query.map,
            source = query.source,
            file_size = query.file_size,
            "sent query to relay"
        );

        let reply = match self.reply_mode {
            ReplyMode::Delay => Reply::Delays(read_message(&mut conn).await?),
            ReplyMode::Combined => Reply::Combined(read_message(&mut conn).await?),
        };
        info!(destinations = reply.rows().len(), "received results from relay");
        Ok(reply)
    }
}
