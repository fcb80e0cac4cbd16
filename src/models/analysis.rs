// src/models/analysis.rs
//
// Result shapes for the image analysis endpoints. These mirror the JSON the
// mobile client already consumes: a parsed glucose reading, a meal breakdown
// with a diabetes-friendliness recommendation, or an auto-detected wrapper
// around either.

use serde::{Deserialize, Serialize};

/// How advisable a detected meal is for a diabetes patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationLevel {
    Yes,
    Careful,
    No,
}

impl RecommendationLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "YES" => Some(Self::Yes),
            "CAREFUL" => Some(Self::Careful),
            "NO" => Some(Self::No),
            _ => None,
        }
    }
}

/// Parsed glucose meter reading plus a short follow-up analysis.
#[derive(Debug, Clone, Serialize)]
pub struct GlucoseAnalysis {
    pub value: f64,
    pub unit: String,
    pub analysis: String,
    pub raw_response: String,
}

/// Parsed meal analysis.
#[derive(Debug, Clone, Serialize)]
pub struct FoodAnalysis {
    pub meal_name: String,
    pub calories: Option<f64>,
    pub carbs_g: Option<f64>,
    pub recommendation_level: RecommendationLevel,
    pub recommendation_text: String,
    pub raw_response: String,
}

/// Outcome of auto-detection between a glucose meter and a meal photo.
/// `Undetermined` is a valid terminal result, not a failure.
#[derive(Debug, Clone)]
pub enum AutoAnalysis {
    Glucose(GlucoseAnalysis),
    Food(FoodAnalysis),
    Undetermined,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct GlucoseReadingBody {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Serialize)]
pub struct GlucoseAnalysisResponse {
    pub success: bool,
    pub reading: GlucoseReadingBody,
    pub analysis: String,
    pub raw_response: String,
}

impl From<GlucoseAnalysis> for GlucoseAnalysisResponse {
    fn from(result: GlucoseAnalysis) -> Self {
        Self {
            success: true,
            reading: GlucoseReadingBody {
                value: result.value,
                unit: result.unit,
            },
            analysis: result.analysis,
            raw_response: result.raw_response,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealBody {
    pub meal_name: String,
    pub calories: Option<f64>,
    pub carbs_g: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FoodAnalysisResponse {
    pub success: bool,
    pub meal: MealBody,
    pub recommendation_level: RecommendationLevel,
    pub recommendation: String,
    pub raw_response: String,
}

impl From<FoodAnalysis> for FoodAnalysisResponse {
    fn from(result: FoodAnalysis) -> Self {
        Self {
            success: true,
            meal: MealBody {
                meal_name: result.meal_name,
                calories: result.calories,
                carbs_g: result.carbs_g,
            },
            recommendation_level: result.recommendation_level,
            recommendation: result.recommendation_text,
            raw_response: result.raw_response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_level_parses_case_insensitively() {
        assert_eq!(
            RecommendationLevel::parse("careful"),
            Some(RecommendationLevel::Careful)
        );
        assert_eq!(RecommendationLevel::parse(" YES "), Some(RecommendationLevel::Yes));
        assert_eq!(RecommendationLevel::parse("maybe"), None);
    }

    #[test]
    fn recommendation_level_serializes_uppercase() {
        let json = serde_json::to_value(RecommendationLevel::Careful).unwrap();
        assert_eq!(json, "CAREFUL");
    }
}
