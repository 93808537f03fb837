//! Dialogue coordinator: validates chat requests and forwards them to the
//! answer service under the caller's context.
//!
//! The gateway keeps no conversation state. `session_id` is passed through
//! untouched and whatever the service returns is echoed back.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::answer::{AnswerService, Question, Source};
use crate::context::CallContext;
use crate::error::DialogueError;
use crate::observe::{Endpoint, Observer, RequestStatus};

/// Inbound chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Chat reply returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

#[derive(Clone)]
pub struct DialogueCoordinator {
    answers: Arc<dyn AnswerService>,
    observer: Arc<dyn Observer>,
}

impl DialogueCoordinator {
    pub fn new(answers: Arc<dyn AnswerService>, observer: Arc<dyn Observer>) -> Self {
        Self { answers, observer }
    }

    /// Answer one chat request.
    ///
    /// An empty message is rejected before anything is sent downstream. Any
    /// downstream failure becomes [`DialogueError::Unavailable`]; there is no
    /// retry.
    pub async fn chat(
        &self,
        ctx: &CallContext,
        request: ChatRequest,
    ) -> Result<ChatResponse, DialogueError> {
        let start = Instant::now();

        if request.message.is_empty() {
            self.finish(start, RequestStatus::BadRequest);
            return Err(DialogueError::EmptyMessage);
        }

        let question = Question {
            message: request.message,
            session_id: request.session_id.filter(|id| !id.is_empty()),
        };

        match self.answers.ask(ctx, question).await {
            Ok(answer) => {
                info!(
                    session_id = %answer.session_id,
                    sources = answer.sources.len(),
                    "Chat answered"
                );
                self.finish(start, RequestStatus::Success);
                Ok(ChatResponse {
                    answer: answer.answer,
                    sources: answer.sources,
                    session_id: answer.session_id,
                })
            }
            Err(err) => {
                error!(error = %err, "RAG service error");
                self.finish(start, RequestStatus::Error);
                Err(DialogueError::Unavailable(err))
            }
        }
    }

    /// Count a request the HTTP layer rejected before it reached `chat`.
    pub fn record_rejected(&self, started: Instant) {
        self.finish(started, RequestStatus::BadRequest);
    }

    fn finish(&self, start: Instant, status: RequestStatus) {
        self.observer.increment_request(Endpoint::Chat, status);
        self.observer
            .observe_latency(Endpoint::Chat, start.elapsed().as_secs_f64());
    }
}
