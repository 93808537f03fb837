#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gateway::{
    Answer, AnswerError, AnswerService, CallContext, DialogueCoordinator, IngestionCoordinator,
    LocalFileStore, NoopObserver, PublishError, Question, Source, TaskMessage, TaskPublisher,
};
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_router, ServerConfig, ServerState};
use tower::ServiceExt;

pub const BOUNDARY: &str = "gateway-test-boundary";

/// Records published tasks; refuses tasks whose saved path ends with
/// `refuse_suffix` and waits `delay` before confirming.
#[derive(Default)]
pub struct MemoryPublisher {
    refuse_suffix: Option<String>,
    delay: Option<Duration>,
    published: Mutex<Vec<TaskMessage>>,
}

impl MemoryPublisher {
    pub fn refusing(suffix: &str) -> Self {
        Self {
            refuse_suffix: Some(suffix.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<TaskMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskPublisher for MemoryPublisher {
    async fn publish(&self, task: &TaskMessage) -> Result<(), PublishError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(suffix) = &self.refuse_suffix {
            if task.file_path.ends_with(suffix.as_str()) {
                return Err(PublishError::Channel("channel closed".into()));
            }
        }
        self.published.lock().unwrap().push(task.clone());
        Ok(())
    }
}

/// Answer service that returns a fixed result.
pub struct CannedAnswers {
    result: Result<Answer, AnswerError>,
    pub questions: Mutex<Vec<Question>>,
}

impl CannedAnswers {
    pub fn answering(answer: &str, session_id: &str) -> Self {
        Self {
            result: Ok(Answer {
                answer: answer.into(),
                sources: vec![Source {
                    doc_name: "handbook.pdf".into(),
                    page: 7,
                    score: 0.5,
                }],
                session_id: session_id.into(),
            }),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(AnswerError::Rpc("Unavailable: connection refused".into())),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.questions.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerService for CannedAnswers {
    async fn ask(&self, _ctx: &CallContext, question: Question) -> Result<Answer, AnswerError> {
        self.questions.lock().unwrap().push(question);
        self.result.clone()
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub answers: Arc<CannedAnswers>,
    pub publisher: Arc<MemoryPublisher>,
}

pub fn test_app(
    upload_root: &std::path::Path,
    answers: CannedAnswers,
    publisher: MemoryPublisher,
) -> TestApp {
    test_app_with_config(upload_root, answers, publisher, ServerConfig::default())
}

pub fn test_app_with_config(
    upload_root: &std::path::Path,
    answers: CannedAnswers,
    publisher: MemoryPublisher,
    config: ServerConfig,
) -> TestApp {
    let answers = Arc::new(answers);
    let publisher = Arc::new(publisher);
    let config = ServerConfig {
        upload_path: upload_root.display().to_string(),
        metrics_enabled: false,
        ..config
    };
    let dialogue = DialogueCoordinator::new(answers.clone(), Arc::new(NoopObserver));
    let ingestion = IngestionCoordinator::new(
        Arc::new(LocalFileStore::new(upload_root)),
        publisher.clone(),
        Arc::new(NoopObserver),
    );
    let state = Arc::new(ServerState::new(config, dialogue, ingestion));
    TestApp {
        router: build_router(state),
        answers,
        publisher,
    }
}

pub async fn send(router: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("Invalid JSON response")
    };
    (status, value)
}

pub fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart body from `(field name, filename, content)` parts.
pub fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let parts: Vec<_> = parts
        .iter()
        .map(|(name, filename, content)| (*name, *filename, content.as_bytes()))
        .collect();
    multipart_request_bytes(&parts)
}

/// Multipart body from `(field name, filename, content)` parts with raw content.
pub fn multipart_request_bytes(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let header = match filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            ),
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
        };
        body.extend_from_slice(header.as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/v1/ingest")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
