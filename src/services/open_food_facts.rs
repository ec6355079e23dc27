use reqwest::header::USER_AGENT;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::ProductLookup;
use crate::error::{NutritionError, NutritionResult};
use crate::models::{Ingredient, NutritionRecord, ServingInfo, ServingType};

const SERVICE: &str = "Open Food Facts";

pub const DEFAULT_API_URL: &str = "https://world.openfoodfacts.org/api/v0/product";

const CLIENT_USER_AGENT: &str = "PhotoCalTracker/0.1 (nutrition lookup)";
const KJ_PER_KCAL: f64 = 4.184;
const MAX_INGREDIENTS: usize = 6;
const PER_100G: &str = "100g";

const UNKNOWN_PRODUCT: &str = "Unknown Product";
const PACKAGED_FOOD: &str = "Packaged food product";
const UNKNOWN_BRAND: &str = "Unknown";
const INGREDIENT_AMOUNT: &str = "varies";

/// Category keywords checked in order; the first hit decides the serving type.
const SERVING_RULES: [(&[&str], ServingType); 3] = [
    (&["breakfast", "cereal"], ServingType::Breakfast),
    (&["beverage", "drink"], ServingType::Beverage),
    (&["dessert", "sweet"], ServingType::Dessert),
];

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub product: Option<Product>,
}

/// The subset of an Open Food Facts product record we read. Community-edited
/// fields occasionally carry the wrong JSON type; those read as missing
/// instead of failing the lookup.
#[derive(Debug, Default, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_name_en: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub categories: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub nutriments: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ingredients_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub serving_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub brands: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub image_url: Option<String>,
}

/// Strings pass through, numbers keep their textual form, anything else is missing.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_object<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Map<String, Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

impl Product {
    /// Per-100g value; numeric strings count, anything else is missing.
    fn nutriment(&self, key: &str) -> Option<f64> {
        let value = match self.nutriments.as_ref()?.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    fn calories(&self) -> u32 {
        self.nutriment("energy-kcal_100g")
            .filter(|kcal| *kcal > 0.0)
            .or_else(|| {
                self.nutriment("energy_100g")
                    .map(|kj| kj / KJ_PER_KCAL)
                    .filter(|kcal| *kcal > 0.0)
            })
            .map(round_non_negative)
            .unwrap_or(0)
    }

    fn grams(&self, key: &str) -> String {
        format!("{}g", round_non_negative(self.nutriment(key).unwrap_or(0.0)))
    }

    fn micronutrients(&self) -> BTreeMap<String, String> {
        let sodium = self.nutriment("sodium_100g").unwrap_or(0.0);
        let fiber = self.nutriment("fiber_100g").unwrap_or(0.0);
        let sugars = self.nutriment("sugars_100g").unwrap_or(0.0);

        BTreeMap::from([
            ("sodium".to_string(), format!("{} mg", round_non_negative(sodium))),
            ("fiber".to_string(), format!("{} g", round_non_negative(fiber))),
            ("sugars".to_string(), format!("{} g", round_non_negative(sugars))),
        ])
    }
}

fn round_non_negative(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Maps free-text product categories to a serving type.
pub fn determine_serving(categories: Option<&str>) -> ServingType {
    let Some(categories) = non_empty(categories) else {
        return ServingType::Snack;
    };
    let category_lower = categories.to_lowercase();

    SERVING_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| category_lower.contains(k)))
        .map(|(_, serving_type)| *serving_type)
        .unwrap_or(ServingType::Snack)
}

/// First six comma-separated ingredients, stripped of digits, parentheses
/// and percent signs.
pub fn extract_ingredients(ingredients_text: Option<&str>) -> Vec<Ingredient> {
    let Some(text) = non_empty(ingredients_text) else {
        return Vec::new();
    };

    text.split(',')
        .take(MAX_INGREDIENTS)
        .map(|segment| {
            let clean: String = segment
                .trim()
                .chars()
                .filter(|c| !matches!(c, '(' | ')' | '%') && !c.is_ascii_digit())
                .collect();
            Ingredient {
                name: capitalize_first(&clean),
                amount: INGREDIENT_AMOUNT.to_string(),
            }
        })
        .collect()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds the canonical record from a product entry (per-100g basis).
pub fn normalize_product(barcode: &str, product: &Product) -> NutritionRecord {
    let categories = non_empty(product.categories.as_deref());

    let food_name = non_empty(product.product_name.as_deref())
        .or_else(|| non_empty(product.product_name_en.as_deref()))
        .unwrap_or(UNKNOWN_PRODUCT);
    let description = non_empty(product.generic_name.as_deref())
        .or(categories)
        .unwrap_or(PACKAGED_FOOD);

    NutritionRecord {
        food_name: food_name.to_string(),
        description: description.to_string(),
        calories: product.calories(),
        protein: product.grams("proteins_100g"),
        carbohydrates: product.grams("carbohydrates_100g"),
        fat: product.grams("fat_100g"),
        serving_info: ServingInfo {
            serving_type: determine_serving(categories),
            servings: non_empty(product.serving_size.as_deref())
                .unwrap_or(PER_100G)
                .to_string(),
            weight: PER_100G.to_string(),
        },
        ingredients: extract_ingredients(product.ingredients_text.as_deref()),
        micronutrients: product.micronutrients(),
        barcode: Some(barcode.to_string()),
        brand: Some(
            non_empty(product.brands.as_deref())
                .unwrap_or(UNKNOWN_BRAND)
                .to_string(),
        ),
        image_url: non_empty(product.image_url.as_deref()).map(str::to_string),
    }
}

/// Open Food Facts product database client.
pub struct OpenFoodFactsClient {
    api_url: String,
    client: reqwest::Client,
}

impl Default for OpenFoodFactsClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl OpenFoodFactsClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn product_url(&self, barcode: &str) -> NutritionResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| NutritionError::upstream(SERVICE, format!("invalid API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| NutritionError::upstream(SERVICE, "API URL cannot take a path"))?
            .pop_if_empty()
            .push(&format!("{}.json", barcode));

        Ok(url)
    }
}

#[async_trait::async_trait]
impl ProductLookup for OpenFoodFactsClient {
    async fn get_product_by_barcode(&self, barcode: &str) -> NutritionResult<NutritionRecord> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            log::warn!("⚠️ Empty barcode, skipping lookup");
            return Err(NutritionError::NotFound {
                barcode: String::new(),
            });
        }

        let url = self.product_url(barcode)?;
        log::info!("🔎 Looking up barcode {} at {}", barcode, url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| NutritionError::upstream(SERVICE, e))?;

        let status = response.status();
        log::debug!("📥 Open Food Facts response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Open Food Facts error ({}): {}", status, error_text);
            return Err(NutritionError::upstream(SERVICE, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NutritionError::upstream(SERVICE, e))?;
        let payload: ProductResponse = serde_json::from_str(&body)
            .map_err(|e| NutritionError::upstream(SERVICE, format!("invalid product JSON: {}", e)))?;

        match payload {
            ProductResponse {
                status: Some(0), ..
            }
            | ProductResponse { product: None, .. } => {
                log::info!("🚫 Product {} not found", barcode);
                Err(NutritionError::NotFound {
                    barcode: barcode.to_string(),
                })
            }
            ProductResponse {
                product: Some(product),
                ..
            } => {
                let record = normalize_product(barcode, &product);
                log::info!(
                    "✅ Found '{}' ({} kcal/100g, {})",
                    record.food_name,
                    record.calories,
                    record.serving_info.serving_type
                );
                Ok(record)
            }
        }
    }
}
