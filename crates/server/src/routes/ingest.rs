use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use gateway::UploadedFile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Multipart field carrying the uploaded files.
pub const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub task_ids: Vec<String>,
}

/// Accept a multipart batch of documents.
///
/// Every part named `files` that carries a filename is one upload. Files are
/// judged individually; the response lists a task id for each file that was
/// both saved and queued. The batch runs on its own task, so a client
/// disconnect or request timeout never interrupts a save or publish.
pub async fn ingest(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<(StatusCode, Json<IngestResponse>)> {
    let started = Instant::now();
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected ingest body");
        state.ingestion.record_rejected(started);
        ServerError::BadRequest("Invalid form data".to_string())
    })?;

    let files = match read_files(&mut multipart).await {
        Ok(files) => files,
        Err(err) => {
            tracing::debug!(error = %err, "Failed to read multipart body");
            state.ingestion.record_rejected(started);
            return Err(if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ServerError::PayloadTooLarge(state.config.max_upload_size_mb)
            } else {
                ServerError::BadRequest("Invalid form data".to_string())
            });
        }
    };

    if files.is_empty() {
        state.ingestion.record_rejected(started);
        return Err(ServerError::BadRequest("No files provided".to_string()));
    }

    // Saves and publishes run to completion even if this handler is dropped.
    let ingestion = state.ingestion.clone();
    let report = tokio::spawn(async move { ingestion.ingest(files).await })
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Ingest batch task failed");
            ServerError::Internal("Ingest batch aborted".to_string())
        })??;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "processing".to_string(),
            task_ids: report.task_ids(),
        }),
    ))
}

async fn read_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, MultipartError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field.bytes().await?;
        files.push(UploadedFile::new(filename, content));
    }
    Ok(files)
}
