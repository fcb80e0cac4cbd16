// src/services/analysis_service.rs
//
// Image analysis relays: glucose meter readings, meal analysis, and
// auto-detection between the two. Each analysis is a multimodal prompt sent
// through the same AiClient as the chat relay, with the model's free-text
// reply parsed into a fixed result shape.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use genai::chat::{ChatMessage, ChatRequest, ContentPart};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::errors::AppError;
use crate::llm::AiClient;
use crate::models::analysis::{AutoAnalysis, FoodAnalysis, GlucoseAnalysis, RecommendationLevel};

const GLUCOSE_READ_PROMPT: &str = "Read the blood glucose value from this glucose meter image.\n\
     Respond ONLY with the number and unit in this exact format: \"VALUE UNIT\"\n\
     Examples: \"125 mg/dL\" or \"6.9 mmol/L\"\n\
     If you cannot read it clearly, respond with \"Unable to read\"";

const CLASSIFY_PROMPT: &str = "Classify this image as exactly one of: GLUCOSE or FOOD.\n\
     - If it is a glucose meter display with a numeric reading, answer: GLUCOSE\n\
     - If it is a food/meal, answer: FOOD\n\
     - If unclear, answer: UNKNOWN\n\
     Reply with a single word only.";

static GLUCOSE_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+\.?\d*)\s*(mg/dL|mmol/L)").expect("valid glucose regex")
});
static MEAL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)meal_name"?\s*[:=]\s*"?([^",\n]+)"#).expect("valid meal regex"));
static CALORIES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?calories"?\s*[:=]\s*(\d+\.?\d*)"#).expect("valid calories regex")
});
static CARBS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?carbs_g"?\s*[:=]\s*(\d+\.?\d*)"#).expect("valid carbs regex")
});
static REC_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(YES|CAREFUL|NO)\b").expect("valid level regex"));
static REC_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)recommendation_text"?\s*[:=]\s*"?(.+)"#).expect("valid rec text regex")
});

/// What the classifier decided an uploaded image shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Glucose,
    Food,
    Unknown,
}

pub struct AnalysisService {
    client: Arc<dyn AiClient>,
    config: Arc<Config>,
}

impl AnalysisService {
    pub fn new(client: Arc<dyn AiClient>, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Reads a glucose meter image and returns the parsed value, unit, and a
    /// brief follow-up analysis.
    #[instrument(skip(self, image_data), err)]
    pub async fn analyze_glucose(
        &self,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<GlucoseAnalysis, AppError> {
        validate_image(image_data)?;

        let request = image_request(GLUCOSE_READ_PROMPT.to_string(), image_data, mime_type);
        let reading_text = self.exec_text(request).await?;

        let lower = reading_text.to_lowercase();
        if lower.contains("unable") || lower.contains("cannot") {
            return Err(AppError::InvalidInput(
                "Unable to read glucose meter from image".to_string(),
            ));
        }

        let (value, unit) = parse_glucose_reading(&reading_text).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Could not parse glucose value from: {reading_text}"
            ))
        })?;

        let analysis_prompt = format!(
            "The patient has a glucose reading of {value} {unit}.\n\
             Provide a brief health analysis (3-4 sentences):\n\
             1. Is this reading normal, high, or low?\n\
             2. What should the patient do next?\n\
             3. Any immediate concerns?\n\
             Be empathetic and professional."
        );
        let analysis = self
            .exec_text(
                ChatRequest::default().append_message(ChatMessage::user(analysis_prompt)),
            )
            .await?;

        Ok(GlucoseAnalysis {
            value,
            unit,
            analysis,
            raw_response: reading_text,
        })
    }

    /// Analyzes a meal photo and returns the meal name, estimates, and a
    /// diabetes-friendliness recommendation.
    #[instrument(skip(self, image_data, health_context), err)]
    pub async fn analyze_food(
        &self,
        image_data: &[u8],
        mime_type: &str,
        health_context: Option<&str>,
    ) -> Result<FoodAnalysis, AppError> {
        validate_image(image_data)?;

        let request = image_request(food_prompt(health_context), image_data, mime_type);
        let response_text = self.exec_text(request).await?;
        Ok(parse_food_reply(&response_text))
    }

    /// Auto-detects whether the image is a glucose meter or food, then runs
    /// the matching analysis. An unclassifiable image is a valid
    /// `Undetermined` outcome, not an error.
    #[instrument(skip(self, image_data, health_context), err)]
    pub async fn analyze_auto(
        &self,
        image_data: &[u8],
        mime_type: &str,
        health_context: Option<&str>,
    ) -> Result<AutoAnalysis, AppError> {
        validate_image(image_data)?;

        let request = image_request(CLASSIFY_PROMPT.to_string(), image_data, mime_type);
        let classify_text = self.exec_text(request).await?;
        let kind = classify_reply(&classify_text);
        debug!(?kind, "Image classified");

        match kind {
            ImageKind::Glucose => Ok(AutoAnalysis::Glucose(
                self.analyze_glucose(image_data, mime_type).await?,
            )),
            ImageKind::Food => Ok(AutoAnalysis::Food(
                self.analyze_food(image_data, mime_type, health_context)
                    .await?,
            )),
            ImageKind::Unknown => Ok(AutoAnalysis::Undetermined),
        }
    }

    async fn exec_text(&self, request: ChatRequest) -> Result<String, AppError> {
        let provider_timeout = Duration::from_secs(self.config.provider_timeout_seconds);
        let response = tokio::time::timeout(
            provider_timeout,
            self.client.exec_chat(&self.config.chat_model, request, None),
        )
        .await
        .map_err(|_| {
            AppError::ProviderUnavailable(
                "AI provider did not respond within the timeout".to_string(),
            )
        })??;
        response
            .content_text_as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::ProviderError("No text content in LLM response".to_string()))
    }
}

fn validate_image(image_data: &[u8]) -> Result<(), AppError> {
    if image_data.is_empty() {
        return Err(AppError::InvalidInput("Image file is empty".to_string()));
    }
    Ok(())
}

fn image_request(prompt: String, image_data: &[u8], mime_type: &str) -> ChatRequest {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image_data);
    ChatRequest::default().append_message(ChatMessage::user(vec![
        ContentPart::from_text(prompt),
        ContentPart::from_image_base64(mime_type.to_string(), encoded),
    ]))
}

fn food_prompt(health_context: Option<&str>) -> String {
    let context_part = health_context
        .map(|ctx| format!("\n\nPatient Health Context:\n{ctx}"))
        .unwrap_or_default();
    format!(
        "You are a diabetes nutrition assistant. Analyze this food image and reply ONLY with JSON.\n\
         Return this JSON shape (no markdown, no extra text):\n\
         {{\n\
           \"meal_name\": \"<short name>\",\n\
           \"calories\": <number or null>,\n\
           \"recommendation_level\": \"YES\" | \"CAREFUL\" | \"NO\",\n\
           \"recommendation_text\": \"<1-2 short sentences, concise, patient-friendly>\",\n\
           \"carbs_g\": <number or null>\n\
         }}\n\
         Rules:\n\
         - Keep it brief and readable for a patient.\n\
         - If unsure, set calories or carbs_g to null.\n\
         - recommendation_level must be exactly YES, CAREFUL, or NO.\n\
         - Do not include any extra fields or explanations.{context_part}"
    )
}

/// Extracts `(value, unit)` from a reply like `"125 mg/dL"`.
pub fn parse_glucose_reading(text: &str) -> Option<(f64, String)> {
    let captures = GLUCOSE_VALUE_RE.captures(text)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some((value, captures.get(2)?.as_str().to_string()))
}

/// Parses the food-analysis JSON reply, with regex fallbacks for models that
/// ignore the JSON-only instruction, and the documented defaults.
pub fn parse_food_reply(response_text: &str) -> FoodAnalysis {
    let parsed: Option<serde_json::Value> = serde_json::from_str(response_text).ok();

    let field_str = |name: &str| -> Option<String> {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let field_num = |name: &str| -> Option<f64> {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(serde_json::Value::as_f64)
    };

    let meal_name = field_str("meal_name").or_else(|| {
        MEAL_NAME_RE
            .captures(response_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    });
    let calories = field_num("calories").or_else(|| {
        CALORIES_RE
            .captures(response_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    });
    let carbs_g = field_num("carbs_g").or_else(|| {
        CARBS_RE
            .captures(response_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    });
    let recommendation_level = field_str("recommendation_level")
        .as_deref()
        .and_then(RecommendationLevel::parse)
        .or_else(|| {
            REC_LEVEL_RE
                .captures(response_text)
                .and_then(|c| c.get(1))
                .and_then(|m| RecommendationLevel::parse(m.as_str()))
        })
        .unwrap_or(RecommendationLevel::Careful);
    let recommendation_text = field_str("recommendation_text")
        .or_else(|| {
            REC_TEXT_RE
                .captures(response_text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().trim_matches('"').to_string())
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Recommendation not available.".to_string());

    FoodAnalysis {
        meal_name: meal_name.unwrap_or_else(|| "Unidentified Meal".to_string()),
        calories,
        carbs_g,
        recommendation_level,
        recommendation_text,
        raw_response: response_text.to_string(),
    }
}

/// Maps the classifier's single-word reply onto an image kind.
pub fn classify_reply(text: &str) -> ImageKind {
    let upper = text.trim().to_uppercase();
    if upper.contains("GLUCOSE") {
        ImageKind::Glucose
    } else if upper.contains("FOOD") {
        ImageKind::Food
    } else {
        ImageKind::Unknown
    }
}
