// src/state.rs

use std::sync::Arc;

use crate::config::Config;
use crate::llm::AiClient;
use crate::services::analysis_service::AnalysisService;
use crate::services::chat_service::ChatService;

/// Shared handles cloned into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<ChatService>,
    pub analysis: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(config: Arc<Config>, client: Arc<dyn AiClient>) -> Self {
        let chat = Arc::new(ChatService::new(Arc::clone(&client), Arc::clone(&config)));
        let analysis = Arc::new(AnalysisService::new(client, Arc::clone(&config)));
        Self {
            config,
            chat,
            analysis,
        }
    }
}
