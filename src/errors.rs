// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    // --- Request/Input Errors ---
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("File upload error: {0}")]
    FileUploadError(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    // --- Upstream AI Provider Errors ---
    #[error("AI provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("API Rate Limit Exceeded")]
    RateLimited,

    #[error("AI provider authentication error: {0}")]
    ProviderAuth(String),

    #[error("AI provider error: {0}")]
    ProviderError(String),

    // --- General/Internal Errors ---
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("IO Error: {0}")]
    IoError(String),

    #[error("Serialization Error: {0}")]
    SerializationError(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Machine-readable error code surfaced alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "VALIDATION_ERROR",
            Self::FileUploadError(_) => "UPLOAD_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ProviderUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::ProviderAuth(_) => "AUTHENTICATION_ERROR",
            Self::ProviderError(_) => "PROVIDER_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::IoError(_) => "IO_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::FileUploadError(e) => {
                error!("File upload error: {}", e);
                (StatusCode::BAD_REQUEST, "File upload failed".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "You've reached the current request limit. Please wait a bit and try again."
                    .to_string(),
            ),
            AppError::ProviderAuth(e) => {
                error!("AI provider authentication error: {}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "The AI service credentials are not valid. Please contact the app administrator."
                        .to_string(),
                )
            }

            // 5xx Server Errors
            AppError::ProviderUnavailable(e) => {
                error!("AI provider unavailable: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "The AI service is temporarily unavailable. Please try again shortly. \
                     Tip: try using streaming mode."
                        .to_string(),
                )
            }
            AppError::ProviderError(e) => {
                error!("AI provider error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "The AI service returned an unexpected response.".to_string(),
                )
            }
            AppError::ConfigError(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
            AppError::IoError(e) => {
                error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "File system or network error".to_string(),
                )
            }
            AppError::SerializationError(e) => {
                error!("Serialization error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Data formatting error".to_string(),
                )
            }
            AppError::InternalServerError(e) => {
                error!("Internal Server Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Classifies a genai error by its message, mirroring the status strings the
/// Gemini API embeds in error payloads.
impl From<genai::Error> for AppError {
    fn from(err: genai::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("503") || lower.contains("unavailable") || lower.contains("overloaded") {
            AppError::ProviderUnavailable(msg)
        } else if lower.contains("429")
            || lower.contains("resource_exhausted")
            || lower.contains("rate limit")
        {
            AppError::RateLimited
        } else if lower.contains("401")
            || lower.contains("unauthenticated")
            || lower.contains("api key")
        {
            AppError::ProviderAuth(msg)
        } else if lower.contains("400") || lower.contains("invalid_argument") {
            AppError::InvalidInput(msg)
        } else {
            AppError::ProviderError(msg)
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::FileUploadError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
