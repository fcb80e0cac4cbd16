// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use healthstake_backend::config::Config;
use healthstake_backend::llm::gemini_client::build_gemini_client;
use healthstake_backend::llm::AiClient;
use healthstake_backend::logging::init_subscriber;
use healthstake_backend::routes::build_router;
use healthstake_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_subscriber();

    let config = Arc::new(Config::load()?);
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; provider calls will fail");
    }

    let client: Arc<dyn AiClient> = build_gemini_client()?;
    let state = AppState::new(Arc::clone(&config), client);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, app = %config.app_name, version = %config.app_version, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
