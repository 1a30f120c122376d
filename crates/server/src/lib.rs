//! Centroid Server - HTTP API for the running centroid accumulator
//!
//! Clients post batches of fixed-dimension vectors and get the batch
//! centroid back, while per-column totals and counts are folded into an
//! aggregate persisted in redb or Redis.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::{Cli, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load(&Cli::parse())?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /status` - Liveness check, `{"status":"ok"}`
//! - `POST /centroid` - Ingest `{"vectors": [[..], ..]}`, returns the batch centroid
//! - `GET /ready` - Readiness check, pings the aggregate store
//! - `GET /metrics` - Prometheus metrics
//!
//! Errors use the envelope `{"error": {"code": "..", "message": ".."}}`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{Cli, ServerConfig, StoreBackend, StoreSettings};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
