pub mod gemini; // Gemini vision API
pub mod open_food_facts; // Open Food Facts product database

#[cfg(all(test, feature = "http-server"))]
pub(crate) mod test_support;

pub use gemini::GeminiService;
pub use open_food_facts::OpenFoodFactsClient;

use crate::error::NutritionResult;
use crate::models::NutritionRecord;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Turns a photo into a nutrition estimate.
#[async_trait::async_trait]
pub trait FoodRecognizer: Send + Sync {
    async fn analyze_image(&self, mime_type: &str, base64_image: &str)
        -> NutritionResult<NutritionRecord>;

    /// Camera captures are always JPEG.
    async fn analyze_food(&self, base64_image: &str) -> NutritionResult<NutritionRecord> {
        self.analyze_image(DEFAULT_IMAGE_MIME, base64_image).await
    }
}

/// Resolves a scanned barcode to a normalized nutrition record.
#[async_trait::async_trait]
pub trait ProductLookup: Send + Sync {
    async fn get_product_by_barcode(&self, barcode: &str) -> NutritionResult<NutritionRecord>;
}
