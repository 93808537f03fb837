//! Neuro gateway HTTP server
//!
//! Exposes the gateway core over HTTP:
//!
//! - `POST /api/v1/chat` - JSON `{message, session_id?}` answered by the answer service
//! - `POST /api/v1/ingest` - multipart `files` parts saved and queued for ingestion (202)
//! - `GET /api/v1/health` - liveness check, never consults downstreams
//! - `GET /metrics` - Prometheus exposition (404 when metrics are disabled)
//!
//! Errors share one body shape, `{"error": {"code", "message"}}`, and every
//! response carries an `x-request-id` header.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
