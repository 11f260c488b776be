//! Computation engines
//!
//! The path engine and the delay engine are datagram services. Each reads one
//! request per datagram and always replies to the datagram's sender: a
//! [`ReplyStatus`] followed, on success, by the result. A failed request is
//! answered with its failure status so the relay never waits on silence.

mod delay;
mod path;

pub use self::delay::{compute_delays, DelayEngine};
pub use self::path::PathEngine;

use tracing::warn;

use crate::core::{Error, Result};
use crate::network::{DatagramEndpoint, FrameWriter};
use crate::protocol::{send_message, write_message, ReplyStatus, WireMessage};

/// Answers the current datagram's source with `outcome`
async fn respond<M: WireMessage>(endpoint: &DatagramEndpoint, outcome: Result<M>) -> Result<M> {
    let outcome = match outcome {
        Ok(result) => send_ok(endpoint, &result).await.map(|()| result),
        Err(e) => Err(e),
    };

    if let Err(e) = &outcome {
        if e.is_request_scoped() {
            report_failure(endpoint, e).await;
        }
    }
    outcome
}

async fn send_ok<M: WireMessage>(endpoint: &DatagramEndpoint, result: &M) -> Result<()> {
    let mut reply = endpoint.reply_sender()?;
    write_message(&mut reply, &ReplyStatus::Ok).await?;
    write_message(&mut reply, result).await?;
    reply.flush().await
}

async fn report_failure(endpoint: &DatagramEndpoint, err: &Error) {
    let status = ReplyStatus::from_error(err);
    let sent = async {
        let mut reply = endpoint.reply_sender()?;
        send_message(&mut reply, &status).await
    }
    .await;

    if let Err(e) = sent {
        warn!(error = %e, ?status, peer = ?endpoint.peer(), "could not report failure");
    }
}
