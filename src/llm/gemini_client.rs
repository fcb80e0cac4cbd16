use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatOptions, ChatRequest, ChatResponse};
use genai::{Client, ClientBuilder};

use super::{AiClient, ChatStream};
use crate::errors::AppError;

/// Production `AiClient` backed by `genai::Client`, which picks up
/// `GEMINI_API_KEY` from the environment.
pub struct GeminiClient {
    inner: Client,
}

pub fn build_gemini_client() -> Result<Arc<GeminiClient>, AppError> {
    let client = ClientBuilder::default().build();
    Ok(Arc::new(GeminiClient { inner: client }))
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn exec_chat(
        &self,
        model_name: &str,
        request: ChatRequest,
        config_override: Option<ChatOptions>,
    ) -> Result<ChatResponse, AppError> {
        self.inner
            .exec_chat(model_name, request, config_override.as_ref())
            .await
            .map_err(AppError::from)
    }

    async fn stream_chat(
        &self,
        model_name: &str,
        request: ChatRequest,
        config_override: Option<ChatOptions>,
    ) -> Result<ChatStream, AppError> {
        let response = self
            .inner
            .exec_chat_stream(model_name, request, config_override.as_ref())
            .await
            .map_err(AppError::from)?;
        let mapped = response.stream.map(|item| item.map_err(AppError::from));
        Ok(Box::pin(mapped) as ChatStream)
    }
}
