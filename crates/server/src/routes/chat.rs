use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use gateway::{CallContext, ChatRequest, ChatResponse};
use std::sync::Arc;
use std::time::Instant;

/// Answer a question through the answer service.
///
/// The call runs under a context bounded by the request timeout and is
/// cancelled if the client goes away (the handler future is dropped).
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ServerResult<Json<ChatResponse>> {
    let started = Instant::now();
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat body");
        state.dialogue.record_rejected(started);
        ServerError::BadRequest("Invalid request".to_string())
    })?;

    let ctx = CallContext::new().with_timeout(state.config.timeout());
    let _cancel_on_drop = ctx.drop_guard();

    let response = state.dialogue.chat(&ctx, request).await?;
    Ok(Json(response))
}
