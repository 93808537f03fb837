//! API route handlers
//!
//! - `health`: liveness check and Prometheus exposition
//! - `chat`: questions answered by the answer service
//! - `ingest`: multipart document uploads queued for ingestion

pub mod chat;
pub mod health;
pub mod ingest;

use crate::error::ServerError;

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
