pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

// Re-export AppState for convenience
pub use state::AppState;

// Compiled unconditionally so integration tests can build a router around
// the mock AI client.
pub mod test_helpers;
