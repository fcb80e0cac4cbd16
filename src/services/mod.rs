pub mod analysis_service;
pub mod chat_service;
pub mod session_store;
