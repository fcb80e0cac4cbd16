// src/config.rs

use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Config {
    // Gemini API
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    // Server
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,

    // Assistant behavior
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    // Session retention policy. Sessions idle longer than the TTL are pruned
    // lazily; when the map is full the least recently active session goes.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    // Upstream call budget
    #[serde(default = "default_provider_timeout_seconds")]
    pub provider_timeout_seconds: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("chat_model", &self.chat_model)
            .field("port", &self.port)
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("max_sessions", &self.max_sessions)
            .field(
                "provider_timeout_seconds",
                &self.provider_timeout_seconds,
            )
            .finish()
    }
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_app_name() -> String {
    "HealthStake Chatbot API".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_system_prompt() -> String {
    "You are a compassionate and professional diabetes health assistant. \
     Your purpose is to help diabetes patients manage their condition effectively. \
     You provide empathetic, evidence-based advice about:\n\
     - Glucose monitoring and interpretation\n\
     - Meal planning and food choices\n\
     - Lifestyle management\n\
     - General diabetes education\n\n\
     IMPORTANT GUIDELINES:\n\
     - Keep answers short and to the point (ideally 2-3 short sentences, maximum 4).\n\
     - Avoid long paragraphs, bullet lists, or step-by-step guides unless the user explicitly asks.\n\
     - Never recommend medication changes (always advise consulting a doctor).\n\
     - If glucose is low (<70 mg/dL), mention immediate safety steps.\n\
     - If glucose is high (>180 mg/dL), provide guidance and when to seek medical help.\n\
     - Be encouraging and supportive.\n\
     - Use the patient's health context when provided to give personalized advice."
        .to_string()
}

const fn default_session_ttl_seconds() -> u64 {
    3600
}

const fn default_max_sessions() -> usize {
    1024
}

const fn default_provider_timeout_seconds() -> u64 {
    60
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `anyhow::Error` if an environment variable has an invalid
    /// format (for example a non-numeric `PORT`).
    pub fn load() -> Result<Self, anyhow::Error> {
        envy::from_env::<Self>().map_err(anyhow::Error::from)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            chat_model: default_chat_model(),
            port: default_port(),
            app_name: default_app_name(),
            app_version: default_app_version(),
            system_prompt: default_system_prompt(),
            session_ttl_seconds: default_session_ttl_seconds(),
            max_sessions: default_max_sessions(),
            provider_timeout_seconds: default_provider_timeout_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.chat_model, "gemini-2.5-flash");
        assert_eq!(config.port, 8000);
        assert_eq!(config.session_ttl_seconds, 3600);
        assert_eq!(config.max_sessions, 1024);
        assert!(config.system_prompt.contains("diabetes"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = Config {
            gemini_api_key: Some("super-secret".to_string()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
