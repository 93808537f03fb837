//! In-memory stand-ins for the gateway's downstream seams.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use gateway::{
    Answer, AnswerError, AnswerService, CallContext, Endpoint, FileStore, LocalFileStore,
    Observer, OutcomeStatus, PublishError, Question, RequestStatus, StoreError, TaskMessage,
    TaskPublisher,
};

/// Observer that remembers everything it was told.
#[derive(Default)]
pub struct RecordingObserver {
    pub requests: Mutex<Vec<(Endpoint, RequestStatus)>>,
    pub latencies: Mutex<Vec<(Endpoint, f64)>>,
    pub files: Mutex<Vec<OutcomeStatus>>,
}

impl RecordingObserver {
    pub fn requests(&self) -> Vec<(Endpoint, RequestStatus)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn files(&self) -> Vec<OutcomeStatus> {
        self.files.lock().unwrap().clone()
    }

    pub fn latency_count(&self) -> usize {
        self.latencies.lock().unwrap().len()
    }
}

impl Observer for RecordingObserver {
    fn increment_request(&self, endpoint: Endpoint, status: RequestStatus) {
        self.requests.lock().unwrap().push((endpoint, status));
    }

    fn observe_latency(&self, endpoint: Endpoint, seconds: f64) {
        self.latencies.lock().unwrap().push((endpoint, seconds));
    }

    fn increment_file_outcome(&self, status: OutcomeStatus) {
        self.files.lock().unwrap().push(status);
    }
}

/// Publisher that keeps acknowledged tasks in memory and can be told to fail
/// for selected messages.
pub struct MemoryPublisher {
    published: Mutex<Vec<TaskMessage>>,
    fail_when: Box<dyn Fn(&TaskMessage) -> bool + Send + Sync>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::failing_when(|_| false)
    }

    pub fn failing_when(pred: impl Fn(&TaskMessage) -> bool + Send + Sync + 'static) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_when: Box::new(pred),
        }
    }

    pub fn published(&self) -> Vec<TaskMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskPublisher for MemoryPublisher {
    async fn publish(&self, message: &TaskMessage) -> Result<(), PublishError> {
        if (self.fail_when)(message) {
            return Err(PublishError::Channel("channel closed".into()));
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Local store that refuses to save selected file names.
pub struct FlakyStore {
    inner: LocalFileStore,
    fail_when: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl FlakyStore {
    pub fn new(root: impl Into<PathBuf>, pred: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: LocalFileStore::new(root),
            fail_when: Box::new(pred),
        }
    }
}

#[async_trait]
impl FileStore for FlakyStore {
    async fn prepare(&self) -> std::io::Result<()> {
        self.inner.prepare().await
    }

    async fn save(&self, filename: &str, content: &Bytes) -> Result<PathBuf, StoreError> {
        if (self.fail_when)(filename) {
            return Err(StoreError {
                path: self.inner.root().join(filename),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(filename, content).await
    }

    fn root(&self) -> &Path {
        self.inner.root()
    }
}

/// Answer service returning a canned reply, or an error, and counting calls.
pub struct CannedAnswers {
    reply: Result<Answer, AnswerError>,
    calls: AtomicUsize,
    pub last_question: Mutex<Option<Question>>,
}

impl CannedAnswers {
    pub fn answering(reply: Answer) -> Self {
        Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
            last_question: Mutex::new(None),
        }
    }

    pub fn failing(err: AnswerError) -> Self {
        Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
            last_question: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerService for CannedAnswers {
    async fn ask(&self, _ctx: &CallContext, question: Question) -> Result<Answer, AnswerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_question.lock().unwrap() = Some(question);
        self.reply.clone()
    }
}
