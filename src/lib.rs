//! Ingress gateway core.
//!
//! The gateway accepts two kinds of work and hands each to its downstream
//! collaborator:
//!
//! - **Questions** go to the answer service over a single long-lived RPC
//!   channel ([`answer::RagAnswerClient`]) through the
//!   [`dialogue::DialogueCoordinator`], bounded by a fixed timeout and the
//!   caller's [`context::CallContext`].
//! - **Documents** are persisted and turned into one queue task each by the
//!   [`ingestion::IngestionCoordinator`], which publishes through a single
//!   confirm-mode AMQP channel ([`broker::AmqpPublisher`]). Each file has its
//!   own outcome; one failure never aborts its siblings.
//!
//! Measurements flow into an injected [`observe::Observer`].
//!
//! Downstream clients sit behind traits ([`answer::AnswerService`],
//! [`broker::TaskPublisher`], [`ingestion::FileStore`]) so coordinators can be
//! exercised without a live broker or answer service.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway::{
//!     AmqpPublisher, BrokerConfig, IngestionCoordinator, LocalFileStore, MetricsObserver,
//!     UploadedFile,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = Arc::new(AmqpPublisher::connect(&BrokerConfig::new("amqp://localhost:5672/")).await?);
//! let ingestion = IngestionCoordinator::new(
//!     Arc::new(LocalFileStore::new("/app/uploads")),
//!     publisher.clone(),
//!     Arc::new(MetricsObserver),
//! );
//! let report = ingestion
//!     .ingest(vec![UploadedFile::new("doc.pdf", b"%PDF-1.7".to_vec())])
//!     .await?;
//! println!("queued {:?}", report.task_ids());
//! publisher.close().await;
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod broker;
pub mod context;
pub mod dialogue;
pub mod error;
pub mod ingestion;
pub mod observe;
pub mod task;

pub use answer::{Answer, AnswerService, Question, RagAnswerClient, Source, DEFAULT_ANSWER_TIMEOUT};
pub use broker::{
    AmqpPublisher, BrokerConfig, ConnectState, ReconnectPolicy, Sleeper, TaskPublisher,
    TokioSleeper, DEFAULT_QUEUE,
};
pub use context::CallContext;
pub use dialogue::{ChatRequest, ChatResponse, DialogueCoordinator};
pub use error::{
    AnswerError, ConnectError, DialogueError, IngestError, PublishError, StoreError,
};
pub use ingestion::{
    FileStore, IngestOutcome, IngestReport, IngestionCoordinator, LocalFileStore, OutcomeStatus,
    UploadedFile, ALLOWED_EXTENSIONS,
};
pub use observe::{Endpoint, MetricsObserver, NoopObserver, Observer, RequestStatus};
pub use task::TaskMessage;
