//! Path engine: shortest distances over the maps of a map file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use pathdelay::engine::PathEngine;
use pathdelay::graph::load_registry;
use pathdelay::{Config, Result};

#[derive(Debug, Parser)]
#[command(name = "path-engine", version, about = "Serve shortest-path queries over datagrams")]
struct Args {
    /// Map description file, overriding PATHDELAY_MAP_FILE
    #[arg(long)]
    map_file: Option<PathBuf>,
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(path) = args.map_file {
        config.map_file = path;
    }

    let maps = Arc::new(load_registry(&config.map_file)?);
    let mut engine = PathEngine::bind(&config.path_engine_addr(), maps).await?;
    engine.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pathdelay=info,path_engine=info")),
        )
        .with_target(false)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "path engine stopped");
            ExitCode::FAILURE
        }
    }
}
