//! Error types produced by the gateway core.
//!
//! | Error | Category | Surfaced as |
//! |-------|----------|-------------|
//! | [`ConnectError`] | Startup fatal | process does not start |
//! | [`PublishError`] | Downstream unavailable | per-file `publish_failed` outcome |
//! | [`StoreError`] | Persistence | per-file `save_failed` outcome |
//! | [`AnswerError`] | Downstream unavailable | whole chat request fails |
//! | [`IngestError`] | Storage root unusable | whole ingest call fails |
//! | [`DialogueError`] | Client error / downstream unavailable | whole chat request fails |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to bring up a process-wide downstream client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectError {
    /// Every connection attempt failed.
    #[error("broker unreachable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The connection came up but the channel or queue could not be prepared.
    #[error("broker channel setup failed: {0}")]
    Channel(String),

    /// The answer service address could not be turned into an RPC endpoint.
    #[error("invalid answer service address '{addr}': {reason}")]
    InvalidEndpoint { addr: String, reason: String },
}

/// A task message could not be handed to the broker.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PublishError {
    #[error("failed to encode task message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker channel error: {0}")]
    Channel(String),

    /// The broker explicitly refused the message.
    #[error("broker rejected message for task {task_id}")]
    Nacked { task_id: String },
}

/// An uploaded file could not be persisted.
#[derive(Error, Debug)]
#[error("failed to save {path}: {source}")]
pub struct StoreError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The answer service could not produce an answer.
///
/// Callers treat every variant the same way, as "service unavailable"; the
/// variants exist for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("answer service call cancelled")]
    Cancelled,

    #[error("answer service deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("answer service rpc failed: {0}")]
    Rpc(String),
}

/// Whole-call failure of an ingest batch.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error("storage root {path} is unavailable: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a chat request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DialogueError {
    /// Client error, no downstream call was made.
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("answer service unavailable: {0}")]
    Unavailable(#[from] AnswerError),
}

impl DialogueError {
    /// Returns true if the caller sent an invalid request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DialogueError::EmptyMessage)
    }
}
