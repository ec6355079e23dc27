use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_FOOD: &str = "Unknown Food";
pub const DEFAULT_SERVINGS: &str = "1 serving";
pub const ZERO_GRAMS: &str = "0g";

/// Canonical nutrition breakdown handed to the display layer.
///
/// Both remote adapters produce this shape. Records are built once per
/// lookup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(default = "unknown_food", deserialize_with = "food_name")]
    pub food_name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub description: String,
    #[serde(default, deserialize_with = "rounded_calories")]
    pub calories: u32,
    #[serde(default = "zero_grams", deserialize_with = "grams")]
    pub protein: String,
    #[serde(default = "zero_grams", deserialize_with = "grams")]
    pub carbohydrates: String,
    #[serde(default = "zero_grams", deserialize_with = "grams")]
    pub fat: String,
    #[serde(default, deserialize_with = "or_default")]
    pub serving_info: ServingInfo,
    #[serde(default, deserialize_with = "or_default")]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, deserialize_with = "quantity_map")]
    pub micronutrients: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingInfo {
    #[serde(rename = "type", default)]
    pub serving_type: ServingType,
    #[serde(default = "default_servings", deserialize_with = "servings")]
    pub servings: String,
    #[serde(default = "zero_grams", deserialize_with = "grams")]
    pub weight: String,
}

impl Default for ServingInfo {
    fn default() -> Self {
        Self {
            serving_type: ServingType::default(),
            servings: default_servings(),
            weight: zero_grams(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "quantity")]
    pub amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServingType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
    Beverage,
    Dessert,
}

impl std::fmt::Display for ServingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServingType::Breakfast => "Breakfast",
            ServingType::Lunch => "Lunch",
            ServingType::Dinner => "Dinner",
            ServingType::Snack => "Snack",
            ServingType::Beverage => "Beverage",
            ServingType::Dessert => "Dessert",
        };
        write!(f, "{}", s)
    }
}

impl ServingType {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Some(ServingType::Breakfast),
            "lunch" => Some(ServingType::Lunch),
            "dinner" => Some(ServingType::Dinner),
            "snack" => Some(ServingType::Snack),
            "beverage" | "drink" => Some(ServingType::Beverage),
            "dessert" => Some(ServingType::Dessert),
            _ => None,
        }
    }
}

// Models sometimes answer with a label outside the known set; those read as Snack.
impl<'de> Deserialize<'de> for ServingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .and_then(|label| ServingType::from_string(&label))
            .unwrap_or_default())
    }
}

/// Which capture path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Camera,
    Barcode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub source: ScanSource,
    pub nutrition: NutritionRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    Upstream,
    NotFound,
}

/// User-facing failure: a fixed title and message plus the label of the
/// manual retry action. Underlying error details are never included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanFailure {
    #[serde(skip)]
    pub kind: FailureKind,
    pub title: String,
    pub message: String,
    pub action: String,
}

impl ScanFailure {
    fn new(kind: FailureKind, title: &str, message: &str, action: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            action: action.to_string(),
        }
    }

    pub fn analysis_failed() -> Self {
        Self::new(
            FailureKind::Upstream,
            "Error",
            "Failed to analyze food. Please try again.",
            "Try again",
        )
    }

    pub fn invalid_image() -> Self {
        Self::new(
            FailureKind::InvalidInput,
            "Error",
            "The captured image could not be read. Please take the photo again.",
            "Try again",
        )
    }

    pub fn product_fetch_failed() -> Self {
        Self::new(
            FailureKind::Upstream,
            "Error",
            "Failed to fetch product information. Please try again.",
            "Try again",
        )
    }

    pub fn product_not_found() -> Self {
        Self::new(
            FailureKind::NotFound,
            "Product Not Found",
            "This product is not in our database. Try scanning another barcode or use the camera to analyze food.",
            "Scan again",
        )
    }
}

fn unknown_food() -> String {
    UNKNOWN_FOOD.to_string()
}

fn zero_grams() -> String {
    ZERO_GRAMS.to_string()
}

fn default_servings() -> String {
    DEFAULT_SERVINGS.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_text(self) -> String {
        match self {
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s,
        }
    }
}

/// Explicit `null` reads the same as a missing field.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn food_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Ok(unknown_food()),
    }
}

/// First number in the text, e.g. 200 for "200-250 kcal".
fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];

    let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let mut end = int_len;
    if let Some(fraction) = rest[int_len..].strip_prefix('.') {
        let frac_len = fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
        if frac_len > 0 {
            end += 1 + frac_len;
        }
    }

    rest[..end].parse::<f64>().ok()
}

fn rounded_calories<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n,
        Some(NumberOrText::Text(s)) => leading_number(&s).unwrap_or(0.0),
        None => 0.0,
    };

    if value.is_finite() && value > 0.0 {
        Ok(value.round() as u32)
    } else {
        Ok(0)
    }
}

fn quantity_or<'de, D: Deserializer<'de>>(
    deserializer: D,
    placeholder: fn() -> String,
) -> Result<String, D::Error> {
    Ok(Option::<NumberOrText>::deserialize(deserializer)?
        .map(NumberOrText::into_text)
        .unwrap_or_else(placeholder))
}

fn grams<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    quantity_or(deserializer, zero_grams)
}

fn servings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    quantity_or(deserializer, default_servings)
}

fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    quantity_or(deserializer, String::new)
}

fn quantity_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let raw = Option::<BTreeMap<String, Option<NumberOrText>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v.into_text())))
        .collect())
}
