// src/test_helpers.rs
//
// Shared fixtures for unit and integration tests: a scriptable AiClient mock
// and a router factory wired against it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use genai::adapter::AdapterKind;
use genai::chat::{
    ChatOptions, ChatRequest, ChatResponse, ChatStreamEvent, MessageContent, StreamChunk,
    StreamEnd, Usage,
};
use genai::ModelIden;

use crate::config::Config;
use crate::errors::AppError;
use crate::llm::{AiClient, ChatStream};
use crate::routes::build_router;
use crate::AppState;

/// Shared call counters, cloneable so tests can keep a handle after the mock
/// moves into the service under test.
#[derive(Clone, Default)]
pub struct CallRecorder {
    exec_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
}

impl CallRecorder {
    pub fn exec_chat_calls(&self) -> usize {
        self.exec_calls.load(Ordering::SeqCst)
    }

    pub fn stream_chat_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
enum ScriptedReply {
    Text(String),
    Empty,
}

enum StreamScript {
    Fragments(Vec<String>),
    ErrorAfter(Vec<String>),
}

/// Scriptable stand-in for the real provider client.
///
/// `with_response` sets the reply for every `exec_chat` call;
/// `with_responses` queues distinct replies for sequential calls (the queue
/// drains first, then the fallback reply applies).
pub struct MockAiClient {
    queued: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    stream_script: StreamScript,
    hang: bool,
    recorder: CallRecorder,
}

impl Default for MockAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAiClient {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: ScriptedReply::Text("Mock response".to_string()),
            stream_script: StreamScript::Fragments(vec!["Mock response".to_string()]),
            hang: false,
            recorder: CallRecorder::default(),
        }
    }

    pub fn with_response(mut self, text: &str) -> Self {
        self.fallback = ScriptedReply::Text(text.to_string());
        self
    }

    pub fn with_responses(self, texts: Vec<&str>) -> Self {
        {
            let mut queued = self.queued.lock().unwrap();
            queued.extend(texts.into_iter().map(|t| ScriptedReply::Text(t.to_string())));
        }
        self
    }

    pub fn with_empty_response(mut self) -> Self {
        self.fallback = ScriptedReply::Empty;
        self
    }

    pub fn with_stream_fragments(mut self, fragments: Vec<&str>) -> Self {
        self.stream_script =
            StreamScript::Fragments(fragments.into_iter().map(str::to_string).collect());
        self
    }

    /// Streams the given fragments, then fails instead of ending cleanly.
    pub fn with_stream_error_after(mut self, fragments: Vec<&str>) -> Self {
        self.stream_script =
            StreamScript::ErrorAfter(fragments.into_iter().map(str::to_string).collect());
        self
    }

    /// Makes every provider call pend forever, for exercising timeout paths
    /// under `tokio::time::pause`.
    pub fn with_hang(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn call_recorder(&self) -> CallRecorder {
        self.recorder.clone()
    }

    pub fn exec_chat_calls(&self) -> usize {
        self.recorder.exec_chat_calls()
    }

    fn next_reply(&self) -> ScriptedReply {
        let mut queued = self.queued.lock().unwrap();
        queued.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

fn mock_response(content: Option<MessageContent>) -> ChatResponse {
    let model_iden = ModelIden::new(AdapterKind::Gemini, "mock-model");
    ChatResponse {
        content,
        reasoning_content: None,
        model_iden: model_iden.clone(),
        provider_model_iden: model_iden,
        usage: Usage::default(),
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn exec_chat(
        &self,
        _model_name: &str,
        _request: ChatRequest,
        _config_override: Option<ChatOptions>,
    ) -> Result<ChatResponse, AppError> {
        self.recorder.exec_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }
        let content = match self.next_reply() {
            ScriptedReply::Text(text) => Some(MessageContent::from_text(text)),
            ScriptedReply::Empty => None,
        };
        Ok(mock_response(content))
    }

    async fn stream_chat(
        &self,
        _model_name: &str,
        _request: ChatRequest,
        _config_override: Option<ChatOptions>,
    ) -> Result<ChatStream, AppError> {
        self.recorder.stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }

        let mut events: Vec<Result<ChatStreamEvent, AppError>> = vec![Ok(ChatStreamEvent::Start)];
        match &self.stream_script {
            StreamScript::Fragments(fragments) => {
                for fragment in fragments {
                    events.push(Ok(ChatStreamEvent::Chunk(StreamChunk {
                        content: fragment.clone(),
                    })));
                }
                events.push(Ok(ChatStreamEvent::End(StreamEnd::default())));
            }
            StreamScript::ErrorAfter(fragments) => {
                for fragment in fragments {
                    events.push(Ok(ChatStreamEvent::Chunk(StreamChunk {
                        content: fragment.clone(),
                    })));
                }
                events.push(Err(AppError::ProviderError(
                    "Mock stream failure".to_string(),
                )));
            }
        }
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Router plus call counters, for integration tests driving the HTTP surface
/// with `tower::ServiceExt::oneshot`.
pub struct TestApp {
    pub router: Router,
    pub calls: CallRecorder,
}

pub fn spawn_app(mock: MockAiClient) -> TestApp {
    let calls = mock.call_recorder();
    let state = AppState::new(Arc::new(Config::default()), Arc::new(mock));
    TestApp {
        router: build_router(state),
        calls,
    }
}
