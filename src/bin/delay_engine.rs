//! Delay engine: transmission and propagation delays per destination.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use pathdelay::engine::DelayEngine;
use pathdelay::{Config, Result};

#[derive(Debug, Parser)]
#[command(name = "delay-engine", version, about = "Serve delay computations over datagrams")]
struct Args {}

async fn run(_args: Args) -> Result<()> {
    let config = Config::from_env()?;
    let mut engine = DelayEngine::bind(&config.delay_engine_addr()).await?;
    engine.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pathdelay=info,delay_engine=info")),
        )
        .with_target(false)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "delay engine stopped");
            ExitCode::FAILURE
        }
    }
}
