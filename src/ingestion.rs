//! Ingestion coordinator: turns a batch of uploads into queued tasks.
//!
//! Each file is handled on its own:
//!
//! 1. **Classify** by lower-cased extension; anything outside
//!    [`ALLOWED_EXTENSIONS`] is skipped as `unsupported_type`.
//! 2. **Persist** under a fresh collision-resistant name; failure is
//!    `save_failed`.
//! 3. **Publish** a [`TaskMessage`] referencing the saved path; failure is
//!    `publish_failed`. The saved file is left in place.
//! 4. Otherwise the file is `accepted` and its task id is reported.
//!
//! A file's failure never affects its siblings. The only whole-batch failure
//! is an unusable storage root.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::broker::TaskPublisher;
use crate::error::{IngestError, StoreError};
use crate::observe::{Endpoint, Observer, RequestStatus};
use crate::task::{extension_of, stored_file_name, TaskMessage};

/// Extensions accepted for ingestion. Matching is case-insensitive.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".txt"];

/// Default number of files processed concurrently within one batch.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// One uploaded file, alive only for the duration of the ingest call.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub extension: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        Self {
            filename,
            extension,
            content: content.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        ALLOWED_EXTENSIONS.contains(&self.extension.as_str())
    }
}

/// Final classification of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Accepted,
    UnsupportedType,
    SaveFailed,
    PublishFailed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Accepted => "accepted",
            OutcomeStatus::UnsupportedType => "unsupported_type",
            OutcomeStatus::SaveFailed => "save_failed",
            OutcomeStatus::PublishFailed => "publish_failed",
        }
    }
}

/// Per-file result. `task_id` is set only for accepted files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub filename: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl IngestOutcome {
    fn rejected(filename: String, status: OutcomeStatus) -> Self {
        Self {
            filename,
            status,
            task_id: None,
        }
    }
}

/// Outcomes for a whole batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    /// Task ids of accepted files, in input order.
    pub fn task_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.task_id.clone())
            .collect()
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Durable storage for uploaded content.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Make sure the storage root exists.
    async fn prepare(&self) -> std::io::Result<()>;

    /// Persist `content` under a fresh name derived from `filename` and return
    /// the full path it was written to.
    async fn save(&self, filename: &str, content: &Bytes) -> Result<PathBuf, StoreError>;

    fn root(&self) -> &Path;
}

/// [`FileStore`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    async fn save(&self, filename: &str, content: &Bytes) -> Result<PathBuf, StoreError> {
        let path = self.root.join(stored_file_name(filename));
        // `create_new` refuses to clobber an existing file.
        let write = async {
            use tokio::io::AsyncWriteExt;

            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await?;
            file.write_all(content).await?;
            file.sync_all().await
        };

        match write.await {
            Ok(()) => Ok(path),
            Err(source) => Err(StoreError { path, source }),
        }
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Coordinates validation, persistence and queue handoff for uploads.
#[derive(Clone)]
pub struct IngestionCoordinator {
    store: Arc<dyn FileStore>,
    publisher: Arc<dyn TaskPublisher>,
    observer: Arc<dyn Observer>,
    concurrency: usize,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn FileStore>,
        publisher: Arc<dyn TaskPublisher>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            store,
            publisher,
            observer,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit how many files of one batch are in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process a batch. Outcomes come back in input order.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport, IngestError> {
        let start = Instant::now();

        if let Err(source) = self.store.prepare().await {
            warn!(root = %self.store.root().display(), error = %source, "Failed to create upload directory");
            self.finish(start, RequestStatus::Error);
            return Err(IngestError::StorageUnavailable {
                path: self.store.root().to_path_buf(),
                source,
            });
        }

        let total = files.len();
        let mut indexed: Vec<(usize, IngestOutcome)> =
            stream::iter(files.into_iter().enumerate().map(|(idx, file)| async move {
                (idx, self.ingest_one(file).await)
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        let report = IngestReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        info!(
            files = total,
            accepted = report.count(OutcomeStatus::Accepted),
            unsupported = report.count(OutcomeStatus::UnsupportedType),
            save_failed = report.count(OutcomeStatus::SaveFailed),
            publish_failed = report.count(OutcomeStatus::PublishFailed),
            "Ingest batch processed"
        );
        self.finish(start, RequestStatus::Success);
        Ok(report)
    }

    async fn ingest_one(&self, file: UploadedFile) -> IngestOutcome {
        let outcome = self.process(file).await;
        self.observer.increment_file_outcome(outcome.status);
        outcome
    }

    async fn process(&self, file: UploadedFile) -> IngestOutcome {
        if !file.is_supported() {
            warn!(filename = %file.filename, extension = %file.extension, "Unsupported file format");
            return IngestOutcome::rejected(file.filename, OutcomeStatus::UnsupportedType);
        }

        let path = match self.store.save(&file.filename, &file.content).await {
            Ok(path) => path,
            Err(err) => {
                warn!(filename = %file.filename, error = %err, "Failed to save file");
                return IngestOutcome::rejected(file.filename, OutcomeStatus::SaveFailed);
            }
        };

        let task = TaskMessage::for_saved_file(&path);
        if let Err(err) = self.publisher.publish(&task).await {
            // The saved file stays behind without a task.
            warn!(
                filename = %file.filename,
                orphaned_path = %path.display(),
                error = %err,
                "Failed to publish task"
            );
            return IngestOutcome::rejected(file.filename, OutcomeStatus::PublishFailed);
        }

        info!(filename = %file.filename, task_id = %task.task_id, "File queued for ingestion");
        IngestOutcome {
            filename: file.filename,
            status: OutcomeStatus::Accepted,
            task_id: Some(task.task_id),
        }
    }

    /// Count a request the HTTP layer rejected before it reached `ingest`.
    pub fn record_rejected(&self, started: Instant) {
        self.finish(started, RequestStatus::BadRequest);
    }

    fn finish(&self, start: Instant, status: RequestStatus) {
        self.observer.increment_request(Endpoint::Ingest, status);
        self.observer
            .observe_latency(Endpoint::Ingest, start.elapsed().as_secs_f64());
    }
}
