use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use genai::chat::{ChatOptions, ChatRequest, ChatResponse, ChatStreamEvent};

use crate::errors::AppError;

pub mod gemini_client;

pub type ChatStreamItem = Result<ChatStreamEvent, AppError>;
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatStreamItem> + Send>>;

/// Provider seam. Everything that talks to the AI goes through this trait so
/// tests can substitute a scripted client.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Executes a chat request and returns the complete response.
    async fn exec_chat(
        &self,
        model_name: &str,
        request: ChatRequest,
        config_override: Option<ChatOptions>,
    ) -> Result<ChatResponse, AppError>;

    /// Executes a chat request in streaming mode.
    async fn stream_chat(
        &self,
        model_name: &str,
        request: ChatRequest,
        config_override: Option<ChatOptions>,
    ) -> Result<ChatStream, AppError>;
}
