//! Centroid Server - HTTP API for the running centroid accumulator

use clap::Parser;
use server::{Cli, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli)?;

    server::start_server(config).await?;

    Ok(())
}
