//! Client for the answer-generation service.
//!
//! One long-lived RPC channel, one attempt per call, and a fixed internal
//! timeout that is further clamped by whatever deadline the caller carries.
//! Every failure collapses into [`AnswerError`], which callers treat as
//! "service unavailable".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::context::CallContext;
use crate::error::{AnswerError, ConnectError};

/// Generated RPC bindings for `proto/rag_service.proto`.
pub mod proto {
    tonic::include_proto!("rag");
}

use proto::rag_service_client::RagServiceClient;

/// Internal per-call timeout.
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(30);

/// A question put to the answer service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Question {
    pub message: String,
    pub session_id: Option<String>,
}

/// Supporting document reference returned with an answer. Opaque to the
/// gateway; order is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub doc_name: String,
    pub page: i32,
    pub score: f32,
}

/// Answer produced by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// Something that can answer a question.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, ctx: &CallContext, question: Question) -> Result<Answer, AnswerError>;
}

/// gRPC-backed [`AnswerService`].
#[derive(Debug, Clone)]
pub struct RagAnswerClient {
    client: RagServiceClient<Channel>,
    timeout: Duration,
}

impl RagAnswerClient {
    /// Build the client for `addr`.
    ///
    /// The address is validated here; the transport connects lazily on first
    /// use, so an answer service that is still starting does not keep the
    /// gateway from coming up. Addresses without a scheme get `http://`.
    pub fn connect_lazy(addr: &str, timeout: Duration) -> Result<Self, ConnectError> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };

        let endpoint = Endpoint::from_shared(uri).map_err(|e| ConnectError::InvalidEndpoint {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let channel = endpoint
            .connect_timeout(timeout)
            .tcp_nodelay(true)
            .connect_lazy();

        Ok(Self::from_channel(channel, timeout))
    }

    pub fn from_channel(channel: Channel, timeout: Duration) -> Self {
        Self {
            client: RagServiceClient::new(channel),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl AnswerService for RagAnswerClient {
    async fn ask(&self, ctx: &CallContext, question: Question) -> Result<Answer, AnswerError> {
        if ctx.is_cancelled() {
            return Err(AnswerError::Cancelled);
        }
        let budget = ctx.budget(self.timeout);
        if budget.is_zero() {
            return Err(AnswerError::DeadlineExceeded(budget));
        }

        let mut request = tonic::Request::new(proto::ChatRequest {
            message: question.message,
            session_id: question.session_id.unwrap_or_default(),
            history: Vec::new(),
        });
        request.set_timeout(budget);

        // Generated clients take `&mut self`; clones share the channel.
        let mut client = self.client.clone();
        let call = tokio::time::timeout(budget, client.get_answer(request));

        let response = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AnswerError::Cancelled),
            result = call => result,
        };

        let reply = response
            .map_err(|_| AnswerError::DeadlineExceeded(budget))?
            .map_err(|status| match status.code() {
                tonic::Code::DeadlineExceeded => AnswerError::DeadlineExceeded(budget),
                tonic::Code::Cancelled => AnswerError::Cancelled,
                _ => AnswerError::Rpc(format!("{}: {}", status.code(), status.message())),
            })?
            .into_inner();

        debug!(sources = reply.sources.len(), "Answer received");
        Ok(reply.into())
    }
}

impl From<proto::Source> for Source {
    fn from(source: proto::Source) -> Self {
        Self {
            doc_name: source.doc_name,
            page: source.page,
            score: source.score,
        }
    }
}

impl From<proto::ChatResponse> for Answer {
    fn from(reply: proto::ChatResponse) -> Self {
        Self {
            answer: reply.answer,
            sources: reply.sources.into_iter().map(Source::from).collect(),
            session_id: reply.session_id,
        }
    }
}
