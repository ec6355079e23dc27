use base64::{engine::general_purpose, Engine};
use std::sync::Arc;

use crate::models::{ScanFailure, ScanResult, ScanSource};
use crate::services::{FoodRecognizer, ProductLookup};

/// Entry point for UI events. Every adapter error stops here and is
/// replaced by a fixed user-facing failure.
pub struct ScanHandler {
    recognizer: Arc<dyn FoodRecognizer>,
    products: Arc<dyn ProductLookup>,
}

impl ScanHandler {
    pub fn new(recognizer: Arc<dyn FoodRecognizer>, products: Arc<dyn ProductLookup>) -> Self {
        Self {
            recognizer,
            products,
        }
    }

    /// Photo taken, as base64 from the client: `mime_type` of `None` means a
    /// JPEG camera capture.
    pub async fn handle_photo(
        &self,
        base64_image: &str,
        mime_type: Option<&str>,
    ) -> Result<ScanResult, ScanFailure> {
        let base64_image = base64_image.trim();
        log::info!(
            "📸 INCOMING PHOTO - {} base64 bytes, mime: {:?}",
            base64_image.len(),
            mime_type
        );

        if !is_valid_image_payload(base64_image) {
            log::warn!("⚠️ Rejecting photo: payload is empty or not base64");
            return Err(ScanFailure::invalid_image());
        }

        self.analyze(base64_image, mime_type).await
    }

    /// Photo taken, as raw image bytes. Encoding our own bytes cannot produce
    /// invalid base64, so only emptiness is checked.
    pub async fn handle_photo_bytes(
        &self,
        image: &[u8],
        mime_type: Option<&str>,
    ) -> Result<ScanResult, ScanFailure> {
        log::info!("📸 INCOMING UPLOAD - {} bytes, mime: {:?}", image.len(), mime_type);

        if image.is_empty() {
            log::warn!("⚠️ Rejecting upload: empty body");
            return Err(ScanFailure::invalid_image());
        }

        let base64_image = general_purpose::STANDARD.encode(image);
        self.analyze(&base64_image, mime_type).await
    }

    async fn analyze(
        &self,
        base64_image: &str,
        mime_type: Option<&str>,
    ) -> Result<ScanResult, ScanFailure> {
        let result = match mime_type {
            Some(mime_type) => self.recognizer.analyze_image(mime_type, base64_image).await,
            None => self.recognizer.analyze_food(base64_image).await,
        };

        match result {
            Ok(nutrition) => Ok(ScanResult {
                source: ScanSource::Camera,
                nutrition,
            }),
            Err(e) => {
                log::error!("❌ Error analyzing food: {}", e);
                Err(ScanFailure::analysis_failed())
            }
        }
    }

    /// Barcode scanned.
    pub async fn handle_barcode(&self, barcode: &str) -> Result<ScanResult, ScanFailure> {
        log::info!("🏷️ INCOMING BARCODE - '{}'", barcode);

        match self.products.get_product_by_barcode(barcode).await {
            Ok(nutrition) => Ok(ScanResult {
                source: ScanSource::Barcode,
                nutrition,
            }),
            Err(e) if e.is_not_found() => {
                log::info!("🔁 {}, asking user to rescan", e);
                Err(ScanFailure::product_not_found())
            }
            Err(e) => {
                log::error!("❌ Error fetching product: {}", e);
                Err(ScanFailure::product_fetch_failed())
            }
        }
    }
}

fn is_valid_image_payload(base64_image: &str) -> bool {
    !base64_image.is_empty() && general_purpose::STANDARD.decode(base64_image).is_ok()
}
