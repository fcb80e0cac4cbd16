// src/routes/analysis.rs
//
// Image analysis endpoints. Each accepts a multipart upload with an `image`
// field, validates it locally, and relays it to the analysis service. The
// optional `health_context` query string is forwarded into the food prompt.

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::errors::AppError;
use crate::models::analysis::{AutoAnalysis, FoodAnalysisResponse, GlucoseAnalysisResponse};
use crate::AppState;

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-glucose", post(analyze_glucose_handler))
        .route("/analyze-food", post(analyze_food_handler))
        .route("/analyze-image", post(analyze_image_handler))
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisQuery {
    health_context: Option<String>,
}

#[instrument(skip_all)]
async fn analyze_glucose_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GlucoseAnalysisResponse>, AppError> {
    let upload = read_image_field(multipart).await?;
    let result = state
        .analysis
        .analyze_glucose(&upload.data, &upload.content_type)
        .await?;
    Ok(Json(result.into()))
}

#[instrument(skip_all)]
async fn analyze_food_handler(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
    multipart: Multipart,
) -> Result<Json<FoodAnalysisResponse>, AppError> {
    let upload = read_image_field(multipart).await?;
    let result = state
        .analysis
        .analyze_food(&upload.data, &upload.content_type, query.health_context.as_deref())
        .await?;
    Ok(Json(result.into()))
}

/// Auto-detects glucose meter vs food and runs the matching analysis. An
/// image the classifier cannot place still gets a 200 with `type: unknown`.
#[instrument(skip_all)]
async fn analyze_image_handler(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let upload = read_image_field(multipart).await?;
    let result = state
        .analysis
        .analyze_auto(&upload.data, &upload.content_type, query.health_context.as_deref())
        .await?;

    let body = match result {
        AutoAnalysis::Glucose(glucose) => {
            let mut body = serde_json::to_value(GlucoseAnalysisResponse::from(glucose))?;
            body["type"] = json!("glucose");
            body
        }
        AutoAnalysis::Food(food) => {
            let mut body = serde_json::to_value(FoodAnalysisResponse::from(food))?;
            body["type"] = json!("food");
            body
        }
        AutoAnalysis::Undetermined => json!({
            "success": true,
            "type": "unknown",
            "message": "Could not determine whether the image is a glucose meter or food",
        }),
    };
    Ok(Json(body))
}

struct ImageUpload {
    data: Bytes,
    content_type: String,
}

/// Pulls the `image` field out of the multipart body and settles on a content
/// type, inferring from the filename when the part carries none (or the
/// generic octet-stream some clients send).
async fn read_image_field(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let mut upload: Option<(Bytes, Option<String>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let content_type = field.content_type().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await?;
            upload = Some((data, content_type, file_name));
        }
    }

    let (data, content_type, file_name) = upload.ok_or_else(|| {
        AppError::InvalidInput("Missing 'image' field in upload".to_string())
    })?;

    let content_type = match content_type {
        Some(ct) if ct != "application/octet-stream" => ct,
        _ => mime_guess::from_path(file_name.unwrap_or_default())
            .first_raw()
            .unwrap_or("image/jpeg")
            .to_string(),
    };

    if !content_type.starts_with("image/") {
        return Err(AppError::InvalidInput(
            "File must be an image".to_string(),
        ));
    }
    if data.is_empty() {
        return Err(AppError::InvalidInput("Image file is empty".to_string()));
    }

    Ok(ImageUpload { data, content_type })
}
