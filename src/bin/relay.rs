//! Relay between requesters and the two computation engines.
//!
//! Configuration comes from `PATHDELAY_*` environment variables; see
//! `pathdelay::Config`.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use pathdelay::core::ReplyMode;
use pathdelay::relay::Relay;
use pathdelay::{Config, Result};

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Relay queries to the path and delay engines")]
struct Args {
    /// Reply with delays only instead of joined distances and delays
    #[arg(long)]
    delay_only: bool,
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    if args.delay_only {
        config.reply_mode = ReplyMode::Delay;
    }

    let mut relay = Relay::bind(&config).await?;
    relay.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pathdelay=info,relay=info")),
        )
        .with_target(false)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "relay stopped");
            ExitCode::FAILURE
        }
    }
}
