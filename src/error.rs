use std::fmt::Display;
use thiserror::Error;

/// Failures raised by the remote nutrition adapters.
#[derive(Debug, Error)]
pub enum NutritionError {
    /// Transport failure or non-2xx status from a remote service.
    #[error("{service} request failed: {detail}")]
    Upstream { service: &'static str, detail: String },

    /// The vision service answered, but not with a usable nutrition object.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The product database has no record for the barcode.
    #[error("product not found for barcode '{barcode}'")]
    NotFound { barcode: String },

    #[error("failed to read image: {0}")]
    ImageRead(#[from] std::io::Error),
}

impl NutritionError {
    pub fn upstream(service: &'static str, detail: impl Display) -> Self {
        NutritionError::Upstream {
            service,
            detail: detail.to_string(),
        }
    }

    pub fn malformed(detail: impl Display) -> Self {
        NutritionError::MalformedResponse(detail.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NutritionError::NotFound { .. })
    }
}

pub type NutritionResult<T> = Result<T, NutritionError>;
