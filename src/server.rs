//! JSON API the mobile client calls after a photo or barcode scan.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::ScanHandler;
use crate::models::{FailureKind, ScanFailure, ScanResult};

/// Full-resolution phone photos exceed axum's 2 MB default once base64-encoded.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub scan_handler: Arc<ScanHandler>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub image: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

pub fn create_scan_router(scan_handler: Arc<ScanHandler>) -> Router {
    let state = Arc::new(AppState { scan_handler });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/analyze/upload", post(upload_handler))
        .route("/api/products/:barcode", get(barcode_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let result = state
        .scan_handler
        .handle_photo(&request.image, request.mime_type.as_deref())
        .await;
    into_response(result)
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    log::debug!("📤 Raw upload: {} bytes", body.len());

    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .filter(|value| value.starts_with("image/"));

    let result = state.scan_handler.handle_photo_bytes(&body, mime_type).await;
    into_response(result)
}

async fn barcode_handler(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
) -> Response {
    into_response(state.scan_handler.handle_barcode(&barcode).await)
}

fn into_response(result: Result<ScanResult, ScanFailure>) -> Response {
    match result {
        Ok(scan) => (StatusCode::OK, Json(scan)).into_response(),
        Err(failure) => (status_for(failure.kind), Json(failure)).into_response(),
    }
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
        FailureKind::Upstream => StatusCode::BAD_GATEWAY,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
    }
}

async fn root_handler() -> &'static str {
    "PhotoCal Tracker API - POST /api/analyze with a photo or GET /api/products/:barcode"
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::scan_handler::tests::stub_handler;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        create_scan_router(Arc::new(stub_handler()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_json() {
        let (status, body) = send(post_json("/api/analyze", json!({ "image": "aGVsbG8=" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "camera");
        assert_eq!(body["nutrition"]["food_name"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_analyze_failure_is_bad_gateway() {
        let (status, body) = send(post_json("/api/analyze", json!({ "image": "ZmFpbA==" }))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Failed to analyze food. Please try again.");
        assert_eq!(body["action"], "Try again");
    }

    #[tokio::test]
    async fn test_analyze_rejects_invalid_base64() {
        let (status, body) = send(post_json("/api/analyze", json!({ "image": "%%%" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["title"], "Error");
    }

    #[tokio::test]
    async fn test_upload_uses_content_type() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze/upload")
            .header(CONTENT_TYPE, "image/png")
            .body(Body::from(vec![0x89, 0x50, 0x4e, 0x47]))
            .unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nutrition"]["food_name"], "image/png");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze/upload")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(vec![0xff, 0xd8, 0xff]))
            .unwrap();
        let (_, body) = send(request).await;
        assert_eq!(body["nutrition"]["food_name"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_empty_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze/upload")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_barcode_found() {
        let (status, body) = send(get("/api/products/123")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "barcode");
        assert_eq!(body["nutrition"]["barcode"], "123");
    }

    #[tokio::test]
    async fn test_barcode_not_found() {
        let (status, body) = send(get("/api/products/000")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["title"], "Product Not Found");
        assert_eq!(body["action"], "Scan again");
    }

    #[tokio::test]
    async fn test_barcode_outage() {
        let (status, body) = send(get("/api/products/555")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Failed to fetch product information. Please try again.");
    }
}
