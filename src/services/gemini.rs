use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{FoodRecognizer, DEFAULT_IMAGE_MIME};
use crate::error::{NutritionError, NutritionResult};
use crate::models::NutritionRecord;

const SERVICE: &str = "Gemini";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const ANALYSIS_PROMPT: &str = r#"Analyze this food image and return ONLY a JSON object with the following structure. Do not include any other text or explanations:

{
  "food_name": "Name of the food item",
  "description": "Brief description of the food",
  "calories": 0,
  "protein": "0g",
  "carbohydrates": "0g",
  "fat": "0g",
  "serving_info": {
    "type": "Dinner/Lunch/Breakfast/Snack",
    "servings": "1 serving",
    "weight": "0g"
  },
  "ingredients": [
    {"name": "Ingredient 1", "amount": "0g"},
    {"name": "Ingredient 2", "amount": "0g"}
  ],
  "micronutrients": {
    "vitamin_d": "0.00 mg",
    "omega_3": "0.00 mg",
    "iron": "0.00 mg"
  }
}

Provide realistic nutritional estimates based on typical serving sizes for the food shown."#;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Gemini vision client. Trusts the model to honor the requested shape and
/// performs no normalization beyond lenient decoding.
pub struct GeminiService {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_api_base(api_key, model, DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_key: String, model: String, api_base: impl Into<String>) -> Self {
        Self {
            api_key,
            model,
            api_base: api_base.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    /// Reads a local image, base64-encodes it and sends it for analysis.
    pub async fn analyze_food_file(&self, image_path: impl AsRef<Path>) -> NutritionResult<NutritionRecord> {
        let image_path = image_path.as_ref();
        log::debug!("📸 Starting image analysis for: {}", image_path.display());

        let image_data = tokio::fs::read(image_path).await?;
        let base64_image = general_purpose::STANDARD.encode(&image_data);

        log::debug!("📊 Image file size: {} bytes", image_data.len());
        log::debug!("🔄 Base64 encoded size: {} bytes", base64_image.len());

        self.analyze_image(mime_for_path(image_path), &base64_image).await
    }

    async fn generate(&self, mime_type: &str, base64_image: &str) -> NutritionResult<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: ANALYSIS_PROMPT },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: base64_image,
                        },
                    },
                ],
            }],
        };

        log::info!("🤖 Sending request to Gemini with model: {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| NutritionError::upstream(SERVICE, e))?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Gemini API error response ({}): {}", status, error_text);
            return Err(NutritionError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| NutritionError::upstream(SERVICE, e))?;
        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        let generated: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| NutritionError::malformed(format!("invalid Gemini envelope: {}", e)))?;

        generated
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| NutritionError::malformed("response has no candidate text"))
    }
}

#[async_trait::async_trait]
impl FoodRecognizer for GeminiService {
    async fn analyze_image(&self, mime_type: &str, base64_image: &str) -> NutritionResult<NutritionRecord> {
        let content = self.generate(mime_type, base64_image).await?;
        log::info!("💬 Gemini response content: {}", content);

        let record = parse_response(&content)?;
        log::info!("✅ Recognized '{}' ({} kcal)", record.food_name, record.calories);
        Ok(record)
    }
}

/// Returns the substring from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_response(text: &str) -> NutritionResult<NutritionRecord> {
    let json = extract_json_object(text)
        .ok_or_else(|| NutritionError::malformed("no JSON object found in response"))?;

    serde_json::from_str(json)
        .map_err(|e| NutritionError::malformed(format!("invalid nutrition JSON: {}", e)))
}

fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => DEFAULT_IMAGE_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, ServingInfo, ServingType};
    use std::collections::BTreeMap;

    fn sample_record() -> NutritionRecord {
        let mut micronutrients = BTreeMap::new();
        micronutrients.insert("vitamin_d".to_string(), "0.00 mg".to_string());
        micronutrients.insert("omega_3".to_string(), "0.10 mg".to_string());
        micronutrients.insert("iron".to_string(), "0.12 mg".to_string());

        NutritionRecord {
            food_name: "Apple".to_string(),
            description: "A medium red apple".to_string(),
            calories: 95,
            protein: "0g".to_string(),
            carbohydrates: "25g".to_string(),
            fat: "0g".to_string(),
            serving_info: ServingInfo {
                serving_type: ServingType::Snack,
                servings: "1 apple".to_string(),
                weight: "182g".to_string(),
            },
            ingredients: vec![Ingredient {
                name: "Apple".to_string(),
                amount: "182g".to_string(),
            }],
            micronutrients,
            barcode: None,
            brand: None,
            image_url: None,
        }
    }

    #[test]
    fn test_extracts_object_from_prose() {
        let text = r#"Here is the result: {"food_name":"Apple","calories":95} Thanks!"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"food_name":"Apple","calories":95}"#)
        );

        let record = parse_response(text).unwrap();
        assert_eq!(record.food_name, "Apple");
        assert_eq!(record.calories, 95);
    }

    #[test]
    fn test_extracts_fenced_answer() {
        let text = "```json\n{\"food_name\": \"Pizza\", \"serving_info\": {\"type\": \"Dinner\"}}\n```";
        let record = parse_response(text).unwrap();
        assert_eq!(record.food_name, "Pizza");
        assert_eq!(record.serving_info.serving_type, ServingType::Dinner);
    }

    #[test]
    fn test_no_object_is_malformed() {
        let err = parse_response("I could not identify any food.").unwrap_err();
        assert!(matches!(err, NutritionError::MalformedResponse(_)));

        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_response("{ food_name: Apple }").unwrap_err();
        assert!(matches!(err, NutritionError::MalformedResponse(_)));

        let err = parse_response(r#"{"ingredients": "apple"}"#).unwrap_err();
        assert!(matches!(err, NutritionError::MalformedResponse(_)));
    }

    #[test]
    fn test_extraction_is_lossless() {
        let record = sample_record();
        let wrapped = format!(
            "Sure! {}\nLet me know if you need anything else.",
            serde_json::to_string_pretty(&record).unwrap()
        );

        assert_eq!(parse_response(&wrapped).unwrap(), record);
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: "prompt" },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "aGVsbG8=",
                        },
                    },
                ],
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "prompt");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "aGVsbG8=");
    }

    #[test]
    fn test_endpoint_and_mime() {
        let service = GeminiService::with_api_base(
            "test_key".to_string(),
            "gemini-1.5-flash".to_string(),
            "https://example.test/v1beta/",
        );
        assert_eq!(
            service.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );

        assert_eq!(mime_for_path(Path::new("meal.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("meal.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("meal")), "image/jpeg");
    }

    #[cfg(feature = "http-server")]
    mod remote {
        use super::*;
        use crate::services::test_support::spawn_upstream;
        use axum::{http::StatusCode, http::Uri, Json, Router};
        use serde_json::{json, Value};

        fn candidate(text: &str) -> Value {
            json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
        }

        async fn fake_gemini() -> GeminiService {
            let router = Router::new().fallback(|uri: Uri, Json(body): Json<Value>| async move {
                if uri.path() != "/models/test-model:generateContent"
                    || uri.query() != Some("key=test-key")
                {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
                }

                let inline = &body["contents"][0]["parts"][1]["inline_data"];
                match inline["data"].as_str() {
                    Some("aGVsbG8=") => (
                        StatusCode::OK,
                        Json(candidate(&format!(
                            "Result: {{\"food_name\": \"{}\", \"calories\": 180}}",
                            inline["mime_type"].as_str().unwrap_or_default()
                        ))),
                    ),
                    Some("ZW1wdHk=") => (StatusCode::OK, Json(json!({ "candidates": [] }))),
                    Some("cHJvc2U=") => (StatusCode::OK, Json(candidate("No food here."))),
                    _ => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({ "error": "overloaded" })),
                    ),
                }
            });

            let base = spawn_upstream(router).await;
            GeminiService::with_api_base("test-key".to_string(), "test-model".to_string(), base)
        }

        #[tokio::test]
        async fn test_analyze_food_sends_jpeg_mime() {
            let service = fake_gemini().await;
            let record = service.analyze_food("aGVsbG8=").await.unwrap();
            assert_eq!(record.food_name, "image/jpeg");
            assert_eq!(record.calories, 180);
        }

        #[tokio::test]
        async fn test_analyze_food_file_sends_png_mime() {
            let path = std::env::temp_dir().join(format!("photocal-{}.png", std::process::id()));
            tokio::fs::write(&path, b"hello").await.unwrap();

            let service = fake_gemini().await;
            let record = service.analyze_food_file(&path).await;
            let _ = tokio::fs::remove_file(&path).await;

            assert_eq!(record.unwrap().food_name, "image/png");
        }

        #[tokio::test]
        async fn test_missing_file_is_read_error() {
            let service = fake_gemini().await;
            let err = service
                .analyze_food_file("/nonexistent/photocal/meal.jpg")
                .await
                .unwrap_err();
            assert!(matches!(err, NutritionError::ImageRead(_)));
        }

        #[tokio::test]
        async fn test_error_status_is_upstream() {
            let service = fake_gemini().await;
            let err = service.analyze_food("bm9wZQ==").await.unwrap_err();
            assert!(matches!(err, NutritionError::Upstream { .. }));
        }

        #[tokio::test]
        async fn test_wrong_key_is_upstream() {
            let base = fake_gemini().await.api_base;
            let service =
                GeminiService::with_api_base("other".to_string(), "test-model".to_string(), base);
            let err = service.analyze_food("aGVsbG8=").await.unwrap_err();
            assert!(matches!(err, NutritionError::Upstream { .. }));
        }

        #[tokio::test]
        async fn test_missing_candidates_is_malformed() {
            let service = fake_gemini().await;
            let err = service.analyze_food("ZW1wdHk=").await.unwrap_err();
            assert!(matches!(err, NutritionError::MalformedResponse(_)));

            let err = service.analyze_food("cHJvc2U=").await.unwrap_err();
            assert!(matches!(err, NutritionError::MalformedResponse(_)));
        }

        #[tokio::test]
        async fn test_unreachable_service_is_upstream() {
            let service = GeminiService::with_api_base(
                "test-key".to_string(),
                "test-model".to_string(),
                "http://127.0.0.1:9",
            );
            let err = service.analyze_food("aGVsbG8=").await.unwrap_err();
            assert!(matches!(err, NutritionError::Upstream { .. }));
        }
    }
}
