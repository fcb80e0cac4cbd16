// src/models/chat.rs
//
// Chat session domain types and the request/response DTOs for the /chat
// endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a turn. Matches the role tags the Gemini SDK uses for
/// conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One role-tagged message within a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_include_history")]
    pub include_history: bool,
}

const fn default_include_history() -> bool {
    true
}

impl Default for ChatQuery {
    fn default() -> Self {
        Self {
            stream: false,
            include_history: default_include_history(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub model: Option<String>,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub chat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UnifiedChatResponse {
    pub response: String,
    pub chat_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub chat_id: Uuid,
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub message: String,
}

/// Events emitted on the SSE stream for `POST /chat/?stream=true`.
///
/// Encoded as `data: {"type": "chunk", ...}` lines; the stream is a finite
/// sequence of `chunk` events terminated by exactly one `complete` (or one
/// `error` if the provider fails mid-stream).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk {
        text: String,
        chat_id: Uuid,
    },
    Complete {
        response: String,
        chat_id: Uuid,
        history: Vec<ChatTurn>,
    },
    Error {
        error: String,
    },
}
