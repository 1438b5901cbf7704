//! HTTP front end for a chatrelay session
//!
//! Routes:
//! - `POST /api/prompt` runs one turn and answers with its summary
//! - `GET /stream` attaches a listener and forwards fragments as Server-Sent Events
//! - `GET /api/history` returns the conversation so far
//! - `GET /health`

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay_core::{Fragment, Message, RelayError, Session};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// SSE event name for a text fragment
pub const TEXT_EVENT: &str = "message";
/// SSE event name marking the end of a turn
pub const END_EVENT: &str = "end";

pub type SharedSession = Arc<Session>;

/// Build the application router around a shared session
pub fn router(session: SharedSession) -> Router {
    Router::new()
        .route("/api/prompt", post(submit_prompt))
        .route("/api/history", get(history))
        .route("/stream", get(stream))
        .route("/health", get(health))
        .with_state(session)
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptReply {
    pub request_id: Uuid,
    pub reply: String,
    pub fragments: usize,
}

/// Errors returned to HTTP clients as `{"error": {"kind", "message"}}`
#[derive(Debug)]
pub enum ApiError {
    Relay(RelayError),
    /// The turn task ended without producing a result
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Relay(err) => status_for(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for a relay failure
pub fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::BadInput(_) => StatusCode::BAD_REQUEST,
        RelayError::UpstreamTransport { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
        RelayError::UpstreamTransport { .. }
        | RelayError::UpstreamStatus { .. }
        | RelayError::Decode { .. } => StatusCode::BAD_GATEWAY,
        RelayError::RelayClosed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::Relay(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match &self {
            ApiError::Relay(err) => (err.kind(), err.to_string()),
            ApiError::Internal(message) => ("internal", message.clone()),
        };
        let body = json!({ "error": { "kind": kind, "message": message } });
        (status, Json(body)).into_response()
    }
}

async fn submit_prompt(
    State(session): State<SharedSession>,
    body: Result<Json<PromptBody>, JsonRejection>,
) -> Result<Json<PromptReply>, ApiError> {
    let Json(body) = body.map_err(|e| RelayError::BadInput(e.body_text()))?;

    // The turn runs on its own task so a disconnecting client cannot cut it short
    let turn = tokio::spawn(async move { session.submit_prompt(&body.prompt).await });
    let summary = match turn.await {
        Ok(result) => result?,
        Err(e) => {
            tracing::error!("Turn task failed: {}", e);
            return Err(ApiError::Internal("turn did not complete".to_string()));
        }
    };

    Ok(Json(PromptReply {
        request_id: summary.request_id,
        reply: summary.reply,
        fragments: summary.fragments,
    }))
}

async fn history(State(session): State<SharedSession>) -> Json<Vec<Message>> {
    Json(session.transcript())
}

async fn stream(State(session): State<SharedSession>) -> impl IntoResponse {
    let listener = session.attach_listener();
    tracing::info!("Stream client connected (listener {})", listener.id());
    let events = listener.map(|fragment| Ok::<_, Infallible>(to_event(fragment)));

    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
}

async fn health() -> &'static str {
    "ok"
}

/// SSE representation of a fragment.
///
/// Carriage returns are normalized to line feeds; the SSE encoder splits
/// multi-line text into several `data:` fields.
pub fn to_event(fragment: Fragment) -> Event {
    match fragment {
        Fragment::Text(text) => {
            let text = text.replace("\r\n", "\n").replace('\r', "\n");
            Event::default().event(TEXT_EVENT).data(text)
        }
        Fragment::EndOfTurn => Event::default().event(END_EVENT).data(""),
    }
}
