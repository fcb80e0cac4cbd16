// src/services/chat_service.rs
//
// Message relay between the HTTP surface and the AI provider. Owns the
// session store; every provider request is assembled from the stored
// transcript plus the system prompt, since the provider keeps no state of
// its own between calls.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use genai::chat::{ChatMessage, ChatRequest, ChatStreamEvent};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::llm::AiClient;
use crate::models::chat::{ChatTurn, StreamEvent, TurnRole, UnifiedChatResponse};
use crate::services::session_store::SessionStore;

/// Canned first-contact reply, served without a provider call.
const GREETING_TEXT: &str = "Hello! Welcome back to HealthStake. I'm your personal diabetes \
                             assistant. How can I help you today?";

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

pub struct ChatService {
    client: Arc<dyn AiClient>,
    store: SessionStore,
    config: Arc<Config>,
}

impl ChatService {
    pub fn new(client: Arc<dyn AiClient>, config: Arc<Config>) -> Self {
        let store = SessionStore::new(
            Duration::from_secs(config.session_ttl_seconds),
            config.max_sessions,
        );
        Self {
            client,
            store,
            config,
        }
    }

    /// Creates a session, optionally pinned to a specific model.
    pub fn create_session(&self, model: Option<String>) -> Uuid {
        let model = model.unwrap_or_else(|| self.config.chat_model.clone());
        let chat_id = self.store.create(&model);
        debug!(%chat_id, %model, "Created chat session");
        chat_id
    }

    /// The ordered transcript for a session, or NotFound.
    pub fn history(&self, chat_id: Uuid) -> Result<Vec<ChatTurn>, AppError> {
        self.store.history(chat_id)
    }

    /// Deletes a session, returning whether it existed.
    pub fn delete_session(&self, chat_id: Uuid) -> bool {
        self.store.delete(chat_id)
    }

    /// Sends one message and returns the complete reply.
    ///
    /// A missing or stale `chat_id` starts a fresh session rather than
    /// failing, so clients can always retry with whatever id they hold.
    #[instrument(skip(self, message), err)]
    pub async fn send_message(
        &self,
        message: &str,
        chat_id: Option<Uuid>,
        include_history: bool,
    ) -> Result<UnifiedChatResponse, AppError> {
        validate_message(message)?;

        if wants_greeting(message, chat_id) {
            let chat_id = self.create_session(None);
            return Ok(UnifiedChatResponse {
                response: GREETING_TEXT.to_string(),
                chat_id,
                history: include_history.then(Vec::new),
            });
        }

        let chat_id = self.resolve_session(chat_id);
        let request = self.build_request(chat_id, message)?;
        let model = self.store.model(chat_id)?;

        let response = self.exec_with_timeout(&model, request).await?;
        let reply = response
            .content_text_as_str()
            .ok_or_else(|| AppError::ProviderError("No text content in LLM response".to_string()))?
            .to_string();

        self.store.append_exchange(chat_id, &model, message, &reply);

        let history = if include_history {
            Some(self.store.history(chat_id)?)
        } else {
            None
        };

        Ok(UnifiedChatResponse {
            response: reply,
            chat_id,
            history,
        })
    }

    /// Sends one message in streaming mode.
    ///
    /// Yields one `chunk` event per nonempty provider fragment, then a single
    /// `complete` event with the assembled reply and the session transcript.
    /// If the provider fails mid-stream an `error` event is emitted and the
    /// partial reply is discarded, keeping the transcript consistent.
    pub fn stream_message(self: &Arc<Self>, message: String, chat_id: Option<Uuid>) -> EventStream {
        let service = Arc::clone(self);
        let stream = async_stream::stream! {
            if let Err(e) = validate_message(&message) {
                yield StreamEvent::Error { error: e.to_string() };
                return;
            }

            if wants_greeting(&message, chat_id) {
                let chat_id = service.create_session(None);
                yield StreamEvent::Chunk { text: GREETING_TEXT.to_string(), chat_id };
                yield StreamEvent::Complete {
                    response: GREETING_TEXT.to_string(),
                    chat_id,
                    history: Vec::new(),
                };
                return;
            }

            let chat_id = service.resolve_session(chat_id);
            let (model, request) = match service
                .store
                .model(chat_id)
                .and_then(|model| Ok((model, service.build_request(chat_id, &message)?)))
            {
                Ok(pair) => pair,
                Err(e) => {
                    yield StreamEvent::Error { error: e.to_string() };
                    return;
                }
            };

            let provider_timeout = Duration::from_secs(service.config.provider_timeout_seconds);
            let init = tokio::time::timeout(
                provider_timeout,
                service.client.stream_chat(&model, request, None),
            )
            .await;
            let mut chat_stream = match init {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    error!(error = ?e, "Failed to initiate AI stream");
                    yield StreamEvent::Error { error: e.to_string() };
                    return;
                }
                Err(_) => {
                    let e = AppError::ProviderUnavailable(
                        "AI provider did not respond within the timeout".to_string(),
                    );
                    yield StreamEvent::Error { error: e.to_string() };
                    return;
                }
            };

            let mut full_response = String::new();
            while let Some(event_result) = chat_stream.next().await {
                match event_result {
                    Ok(ChatStreamEvent::Start) => {
                        debug!(%chat_id, "AI stream started");
                    }
                    Ok(ChatStreamEvent::Chunk(chunk)) => {
                        if chunk.content.is_empty() {
                            continue;
                        }
                        full_response.push_str(&chunk.content);
                        yield StreamEvent::Chunk { text: chunk.content, chat_id };
                    }
                    Ok(ChatStreamEvent::End(_)) => {
                        debug!(%chat_id, "AI stream ended");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Discard the partial reply so the transcript never
                        // contains a half-finished exchange.
                        warn!(%chat_id, error = ?e, "AI stream failed mid-stream; discarding partial reply");
                        yield StreamEvent::Error { error: e.to_string() };
                        return;
                    }
                }
            }

            service
                .store
                .append_exchange(chat_id, &model, &message, &full_response);
            let history = service.store.history(chat_id).unwrap_or_default();
            yield StreamEvent::Complete { response: full_response, chat_id, history };
        };
        Box::pin(stream)
    }

    fn resolve_session(&self, chat_id: Option<Uuid>) -> Uuid {
        match chat_id {
            Some(id) if self.store.touch(id) => id,
            Some(stale) => {
                warn!(chat_id = %stale, "Stale chat_id; starting a fresh session");
                self.create_session(None)
            }
            None => self.create_session(None),
        }
    }

    fn build_request(&self, chat_id: Uuid, message: &str) -> Result<ChatRequest, AppError> {
        let mut request = ChatRequest::default().with_system(&self.config.system_prompt);
        for turn in self.store.history(chat_id)? {
            let chat_message = match turn.role {
                TurnRole::User => ChatMessage::user(turn.text),
                TurnRole::Model => ChatMessage::assistant(turn.text),
            };
            request = request.append_message(chat_message);
        }
        Ok(request.append_message(ChatMessage::user(message)))
    }

    async fn exec_with_timeout(
        &self,
        model: &str,
        request: ChatRequest,
    ) -> Result<genai::chat::ChatResponse, AppError> {
        let provider_timeout = Duration::from_secs(self.config.provider_timeout_seconds);
        tokio::time::timeout(provider_timeout, self.client.exec_chat(model, request, None))
            .await
            .map_err(|_| {
                AppError::ProviderUnavailable(
                    "AI provider did not respond within the timeout".to_string(),
                )
            })?
    }
}

fn validate_message(message: &str) -> Result<(), AppError> {
    if message.is_empty() {
        return Err(AppError::InvalidInput(
            "message must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Empty-ish greetings on first contact get the canned intro instead of a
/// model call.
fn wants_greeting(message: &str, chat_id: Option<Uuid>) -> bool {
    if chat_id.is_some() {
        return false;
    }
    matches!(
        message.trim().to_lowercase().as_str(),
        "" | "hi" | "hello" | "hey"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockAiClient;

    fn service(mock: MockAiClient) -> Arc<ChatService> {
        Arc::new(ChatService::new(
            Arc::new(mock),
            Arc::new(Config::default()),
        ))
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_provider_call() {
        let mock = MockAiClient::new().with_response("unused");
        let calls = mock.call_recorder();
        let service = service(mock);
        let err = service.send_message("", None, true).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(calls.exec_chat_calls(), 0);
    }

    #[tokio::test]
    async fn greeting_shortcut_skips_provider() {
        let mock = MockAiClient::new().with_response("unused");
        let calls = mock.call_recorder();
        let service = service(mock);
        let result = service.send_message("hi", None, true).await.unwrap();
        assert!(result.response.contains("HealthStake"));
        assert_eq!(result.history.as_deref(), Some(&[][..]));
        assert_eq!(calls.exec_chat_calls(), 0);
    }

    #[tokio::test]
    async fn send_message_commits_both_turns() {
        let mock = MockAiClient::new().with_response("They have eight paws.");
        let service = service(mock);
        let result = service
            .send_message("How many paws?", None, true)
            .await
            .unwrap();
        assert_eq!(result.response, "They have eight paws.");
        let history = result.history.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].text, "How many paws?");
        assert_eq!(history[1].role, TurnRole::Model);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_call_times_out_as_unavailable() {
        let mock = MockAiClient::new().with_hang();
        let service = service(mock);
        let chat_id = service.create_session(None);
        let err = service
            .send_message("How many paws?", Some(chat_id), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderUnavailable(_)));
        // No turn is committed for a reply that never came.
        assert!(service.history(chat_id).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stream_initiation_times_out_with_error_event() {
        let mock = MockAiClient::new().with_hang();
        let service = service(mock);
        let events: Vec<StreamEvent> = service
            .stream_message("Tell me a story".to_string(), None)
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { error } => assert!(error.contains("unavailable")),
            other => panic!("Expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn contentless_provider_reply_is_a_provider_error() {
        let mock = MockAiClient::new().with_empty_response();
        let service = service(mock);
        let err = service
            .send_message("How many paws?", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderError(_)));
    }

    #[tokio::test]
    async fn stale_chat_id_starts_fresh_session() {
        let mock = MockAiClient::new().with_response("Hello there.");
        let service = service(mock);
        let stale = Uuid::new_v4();
        let result = service
            .send_message("Good morning", Some(stale), false)
            .await
            .unwrap();
        assert_ne!(result.chat_id, stale);
        assert_eq!(service.history(result.chat_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stream_concatenation_matches_complete_event() {
        let mock =
            MockAiClient::new().with_stream_fragments(vec!["Once", " upon", " a time."]);
        let service = service(mock);
        let events: Vec<StreamEvent> = service
            .stream_message("Tell me a story".to_string(), None)
            .collect()
            .await;

        let mut concatenated = String::new();
        let mut chunk_count = 0;
        for event in &events {
            if let StreamEvent::Chunk { text, .. } = event {
                concatenated.push_str(text);
                chunk_count += 1;
            }
        }
        assert_eq!(chunk_count, 3);
        match events.last().unwrap() {
            StreamEvent::Complete { response, history, .. } => {
                assert_eq!(response, "Once upon a time.");
                assert_eq!(response, &concatenated);
                assert_eq!(history.len(), 2);
            }
            other => panic!("Expected complete event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_stream_error_discards_partial_reply() {
        let mock = MockAiClient::new().with_stream_error_after(vec!["Once", " upon"]);
        let service = service(mock);
        let events: Vec<StreamEvent> = service
            .stream_message("Tell me a story".to_string(), None)
            .collect()
            .await;

        assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
        // The partial reply must not be committed.
        let chat_id = events
            .iter()
            .find_map(|event| match event {
                StreamEvent::Chunk { chat_id, .. } => Some(*chat_id),
                _ => None,
            })
            .expect("at least one chunk before the error");
        assert!(service.history(chat_id).unwrap().is_empty());
    }

    #[test]
    fn greeting_detection_requires_fresh_session() {
        assert!(wants_greeting("hello", None));
        assert!(wants_greeting("  Hey  ", None));
        assert!(!wants_greeting("hello", Some(Uuid::new_v4())));
        assert!(!wants_greeting("how are you", None));
    }
}
