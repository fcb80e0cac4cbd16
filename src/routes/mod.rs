// src/routes/mod.rs

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod analysis;
pub mod chat;
pub mod health;

/// Assembles the full application router. The mobile client calls from a
/// webview origin, hence the permissive CORS policy.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/chat/", chat::chat_routes())
        .nest("/api/ai", analysis::analysis_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
