// src/routes/chat.rs
//
// HTTP surface for the chat relay: session lifecycle plus a unified message
// endpoint that serves either a complete JSON reply or an SSE stream,
// selected by the `stream` query flag.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::{
    ChatHistoryResponse, ChatMessageRequest, ChatQuery, CreateSessionRequest,
    CreateSessionResponse, DeleteSessionResponse,
};
use crate::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(unified_chat_handler))
        .route("/session/create", post(create_session_handler))
        .route("/:chat_id/history", get(chat_history_handler))
        .route("/:chat_id", delete(delete_session_handler))
}

#[instrument(skip(state, payload))]
async fn create_session_handler(
    State(state): State<AppState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let chat_id = state.chat.create_session(request.model);
    (StatusCode::CREATED, Json(CreateSessionResponse { chat_id }))
}

/// `POST /chat/` with `?stream=false` (default) returns the full reply as
/// JSON; with `?stream=true` it returns an SSE stream of `chunk` events
/// terminated by one `complete` or `error` event.
#[instrument(skip(state, payload), fields(stream = query.stream))]
async fn unified_chat_handler(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    Json(payload): Json<ChatMessageRequest>,
) -> Result<Response, AppError> {
    if query.stream {
        let events = state
            .chat
            .stream_message(payload.message, payload.chat_id)
            .map(|event| Event::default().json_data(&event));
        let sse = Sse::new(events).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        );
        return Ok(sse.into_response());
    }

    let response = state
        .chat
        .send_message(&payload.message, payload.chat_id, query.include_history)
        .await?;
    Ok(Json(response).into_response())
}

#[instrument(skip(state))]
async fn chat_history_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatHistoryResponse>, AppError> {
    let history = state.chat.history(chat_id)?;
    Ok(Json(ChatHistoryResponse { chat_id, history }))
}

#[instrument(skip(state))]
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    if !state.chat.delete_session(chat_id) {
        return Err(AppError::NotFound(format!(
            "Chat session {chat_id} not found"
        )));
    }
    Ok(Json(DeleteSessionResponse {
        message: format!("Chat session {chat_id} deleted"),
    }))
}
