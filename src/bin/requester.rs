//! Requester: asks the relay for delays from one vertex of a map.
//!
//! Usage: `requester <MAP_ID> <SOURCE_VERTEX> <FILE_SIZE_BITS>`

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use pathdelay::client::Requester;
use pathdelay::core::{FileSize, MapId, VertexId};
use pathdelay::protocol::Query;
use pathdelay::{Config, Error, Result};

#[derive(Debug, Parser)]
#[command(name = "requester", version, about = "Query end-to-end delays through the relay")]
struct Args {
    /// Single-character map identifier
    map: MapId,

    /// Source vertex
    #[arg(allow_negative_numbers = true)]
    source: VertexId,

    /// File size in bits
    file_size: FileSize,
}

async fn run(args: Args) -> Result<()> {
    if args.file_size < 0 {
        return Err(Error::invalid_argument(format!(
            "file size must not be negative, got {}",
            args.file_size
        )));
    }

    let config = Config::from_env()?;
    let query = Query {
        map: args.map,
        source: args.source,
        file_size: args.file_size,
    };

    let reply = Requester::from_config(&config).query(&query).await?;

    println!("{:<13}{:<12}{:<12}{:<12}{:<12}", "Destination", "Min Length", "Tt", "Tp", "Delay");
    for row in reply.rows() {
        let distance = row
            .distance
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "{:<13}{:<12}{:<12.2}{:<12.2}{:<12.2}",
            row.destination,
            distance,
            row.transmission,
            row.propagation,
            row.total()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pathdelay=warn")),
        )
        .with_target(false)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "query failed");
            ExitCode::FAILURE
        }
    }
}
