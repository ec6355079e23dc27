pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod server; // Scan API for the mobile client

pub use error::{NutritionError, NutritionResult};
pub use handlers::ScanHandler;
pub use models::NutritionRecord;
