//! HTTP surface: health, generation, history, gallery and stored images.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::gallery::{self, GalleryItem};
use crate::generation::{
    GenerateImageBody, GeneratedImage, GenerationRequest, GenerationSettings, ImageQuality,
    ImageSize,
};
use crate::history::{HistoryEntry, HistoryStore};
use crate::provider::{ImageProvider, ProviderError, ProviderImageItem};
use crate::storage::ImageStore;

mod images;

use images::serve_upload_handler;

#[derive(Clone)]
pub(crate) struct AppState {
    provider: Option<Arc<dyn ImageProvider>>,
    store: ImageStore,
    history: HistoryStore,
    strict_errors: bool,
}

impl AppState {
    fn new(provider: Option<Arc<dyn ImageProvider>>, store: ImageStore, strict_errors: bool) -> Self {
        Self {
            provider,
            store,
            history: HistoryStore::new(),
            strict_errors,
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Image Generation API is running"
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageResponse {
    success: bool,
    images: Vec<GeneratedImage>,
    original_prompt: String,
    source: String,
    settings: GenerationSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

async fn generate_image_handler(
    State(state): State<AppState>,
    Json(body): Json<GenerateImageBody>,
) -> Result<Json<GenerateImageResponse>, AppError> {
    let request = GenerationRequest::validate(body)?;
    let Some(provider) = state.provider.clone() else {
        return Err(AppError::ProviderNotConfigured);
    };

    info!(
        "Generating {} image(s) for prompt: \"{}\"",
        request.count, request.prompt
    );

    match provider.generate(&request).await {
        Ok(items) => {
            let request_millis = Utc::now().timestamp_millis();
            let mut generated = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let id = ImageStore::image_id(request_millis, index);
                let stored = state.store.store_item(item, &request, &id).await;
                if stored.degraded {
                    warn!("Persistence degraded for {}, serving inline image data", stored.image.id);
                }
                generated.push(stored.image);
            }
            info!("Generation successful, {} image(s)", generated.len());
            Ok(Json(GenerateImageResponse {
                success: true,
                images: generated,
                original_prompt: request.prompt.clone(),
                source: provider.name().to_string(),
                settings: request.settings(),
                warning: None,
            }))
        }
        Err(ProviderError::InvalidApiKey) => Err(AppError::InvalidApiKey),
        Err(ProviderError::QuotaExceeded) => Err(AppError::QuotaExceeded),
        Err(ProviderError::ContentPolicy) => Err(AppError::ContentPolicy),
        Err(ProviderError::Other(message)) => {
            if state.strict_errors {
                return Err(AppError::ProviderUnavailable(message));
            }
            warn!("Provider failed ({message}), falling back to placeholder images");
            let request_millis = Utc::now().timestamp_millis();
            Ok(Json(GenerateImageResponse {
                success: true,
                images: placeholder_images(&request, request_millis),
                original_prompt: request.prompt.clone(),
                source: "Mock Images (generation failed)".to_string(),
                settings: request.settings(),
                warning: Some(format!("Image generation failed: {message}")),
            }))
        }
    }
}

/// Substitute images keeping the response non-empty when the provider is
/// degraded; clearly labeled so nobody mistakes them for the real thing.
fn placeholder_images(request: &GenerationRequest, request_millis: i64) -> Vec<GeneratedImage> {
    let (width, height) = request.size.dimensions();
    (0..usize::from(request.count))
        .map(|index| GeneratedImage {
            id: format!("mock_{request_millis}_{index}"),
            url: format!("https://picsum.photos/{width}/{height}?random={request_millis}_{index}"),
            revised_prompt: format!("Mock image for: {}", request.prompt),
        })
        .collect()
}

/// Connectivity self-test: asks the configured provider for a single fixed
/// image and reports whether the round trip worked.
async fn test_image_connection_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(provider) = state.provider.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "Error",
                "message": "Image generation API is not configured"
            })),
        );
    };

    let request = GenerationRequest {
        prompt: "A simple red circle on white background".to_string(),
        size: ImageSize::Square,
        quality: ImageQuality::Medium,
        count: 1,
    };
    match provider.generate(&request).await {
        Ok(items) => {
            let test_image = match items.first() {
                Some(ProviderImageItem::Url { url, .. }) => url.clone(),
                Some(ProviderImageItem::Inline { .. }) => "Base64 data received".to_string(),
                None => "No image data".to_string(),
            };
            (
                StatusCode::OK,
                Json(json!({
                    "status": "Connected",
                    "message": "Image generation successful",
                    "provider": provider.name(),
                    "testImage": test_image
                })),
            )
        }
        Err(err) => {
            warn!("Image connection test failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "Error",
                    "message": "Image generation connection failed",
                    "provider": provider.name(),
                    "error": err.to_string()
                })),
            )
        }
    }
}

async fn history_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "history": state.history.list().await }))
}

#[derive(Debug, Serialize)]
struct UploadsResponse {
    images: Vec<GalleryItem>,
    count: usize,
}

async fn uploads_handler(State(state): State<AppState>) -> Result<Json<UploadsResponse>, AppError> {
    let images = gallery::scan(&state.store)
        .await
        .map_err(|err| AppError::UploadsScanFailed(err.to_string()))?;
    Ok(Json(UploadsResponse {
        count: images.len(),
        images,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveToHistoryBody {
    prompt: Option<String>,
    image_url: Option<String>,
    settings: Option<GenerationSettings>,
    duration: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SaveToHistoryResponse {
    success: bool,
    item: HistoryEntry,
}

async fn save_to_history_handler(
    State(state): State<AppState>,
    Json(body): Json<SaveToHistoryBody>,
) -> Result<Json<SaveToHistoryResponse>, AppError> {
    let prompt = body
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Prompt is required".to_string()))?;
    let image_url = body
        .image_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Image URL is required".to_string()))?;

    let now = Utc::now();
    let item = HistoryEntry {
        id: now.timestamp_millis().to_string(),
        prompt,
        image_url,
        settings: body.settings,
        duration: body.duration,
        created_at: now,
    };
    state.history.append(item.clone()).await;

    Ok(Json(SaveToHistoryResponse {
        success: true,
        item,
    }))
}

async fn fallback_handler(uri: axum::http::Uri) -> impl IntoResponse {
    info!("404 {uri}");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", axum::routing::get(health_handler))
        .route(
            "/api/generate-image",
            axum::routing::post(generate_image_handler),
        )
        .route(
            "/api/test-image-connection",
            axum::routing::get(test_image_connection_handler),
        )
        .route("/api/history", axum::routing::get(history_handler))
        .route("/api/uploads", axum::routing::get(uploads_handler))
        .route(
            "/api/save-to-history",
            axum::routing::post(save_to_history_handler),
        )
        .route("/uploads/{filename}", axum::routing::get(serve_upload_handler))
        .fallback(fallback_handler)
        .layer(CorsLayer::permissive())
}

/// Builds the application state and serves until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    provider: Option<Arc<dyn ImageProvider>>,
    store: ImageStore,
    strict_errors: bool,
) -> Result<(), anyhow::Error> {
    let app = create_router().with_state(AppState::new(provider, store, strict_errors));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    info!("API endpoints:");
    info!("   GET  /api/health - Health check");
    info!("   POST /api/generate-image - Generate images");
    info!("   GET  /api/test-image-connection - Test provider connectivity");
    info!("   GET  /api/history - Get generation history");
    info!("   GET  /api/uploads - Get all uploaded images");
    info!("   POST /api/save-to-history - Save image to history");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header::CONTENT_TYPE};
    use base64::Engine;
    use base64::engine::general_purpose;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct MockProvider(Result<Vec<ProviderImageItem>, ProviderError>);

    #[async_trait]
    impl ImageProvider for MockProvider {
        fn name(&self) -> &str {
            "Mock Provider"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<Vec<ProviderImageItem>, ProviderError> {
            self.0.clone()
        }
    }

    fn setup_state(
        upload_dir: &std::path::Path,
        result: Result<Vec<ProviderImageItem>, ProviderError>,
        strict_errors: bool,
    ) -> AppState {
        AppState::new(
            Some(Arc::new(MockProvider(result))),
            ImageStore::new(upload_dir.to_path_buf(), "http://localhost:9000"),
            strict_errors,
        )
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn inline_item(payload: &[u8]) -> ProviderImageItem {
        ProviderImageItem::Inline {
            b64_json: general_purpose::STANDARD.encode(payload),
            revised_prompt: Some("a bold red circle".to_string()),
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let response = app.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "Image Generation API is running");
    }

    #[tokio::test]
    async fn generate_rejects_invalid_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let cases = [
            (
                json!({"size": "512x512", "prompt": "x"}),
                "Invalid size. Must be one of: 1024x1024, 1024x1536, 1536x1024",
            ),
            (
                json!({"quality": "ultra", "prompt": "x"}),
                "Invalid quality. Must be one of: medium, auto",
            ),
            (
                json!({"n": 11, "prompt": "x"}),
                "Number of images must be between 1 and 10",
            ),
            (json!({}), "Prompt is required"),
        ];
        for (body, expected) in cases {
            let response = app
                .clone()
                .oneshot(post_json("/api/generate-image", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = read_json(response).await;
            assert_eq!(body["error"], expected);
        }
    }

    #[tokio::test]
    async fn generate_without_provider_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::new(
            None,
            ImageStore::new(dir.path().to_path_buf(), "http://localhost:9000"),
            false,
        );
        let app = create_router().with_state(state);

        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Image generation API is not configured");
    }

    #[tokio::test]
    async fn inline_items_are_persisted_and_listed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = vec![inline_item(b"first image"), inline_item(b"second image")];
        let app = create_router().with_state(setup_state(dir.path(), Ok(items), false));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle", "size": "1024x1024", "quality": "medium", "n": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["originalPrompt"], "a red circle");
        assert_eq!(body["settings"], json!({"size": "1024x1024", "quality": "medium", "n": 2}));

        let images = body["images"].as_array().expect("images array");
        assert_eq!(images.len(), 2);
        assert_ne!(images[0]["id"], images[1]["id"]);
        for image in images {
            let url = image["url"].as_str().expect("url");
            assert!(url.starts_with("http://localhost:9000/uploads/"));
            assert_eq!(image["revisedPrompt"], "a bold red circle");
        }

        // Two image files and two sidecars on disk.
        let mut files: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().into_string().expect("name"))
            .collect();
        files.sort();
        assert_eq!(files.len(), 4);
        assert_eq!(files.iter().filter(|name| name.ends_with("_meta.json")).count(), 2);

        let response = app.oneshot(get("/api/uploads")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["count"], 2);
        for item in body["images"].as_array().expect("gallery array") {
            assert_eq!(item["prompt"], "a red circle");
        }
    }

    #[tokio::test]
    async fn url_items_do_not_touch_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload_dir = dir.path().join("uploads");
        let items = vec![ProviderImageItem::Url {
            url: "https://provider.example/direct.png".to_string(),
            revised_prompt: None,
        }];
        let app = create_router().with_state(setup_state(&upload_dir, Ok(items), false));

        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["images"][0]["url"], "https://provider.example/direct.png");
        assert_eq!(body["images"][0]["revisedPrompt"], "a red circle");
        assert!(!upload_dir.exists());
    }

    #[tokio::test]
    async fn auth_failure_maps_to_401_and_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::InvalidApiKey),
            false,
        ));

        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Invalid OpenAI API key");
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn quota_and_policy_failures_map_to_their_statuses() {
        let dir = tempfile::tempdir().expect("tempdir");

        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::QuotaExceeded),
            false,
        ));
        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::ContentPolicy),
            false,
        ));
        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(
            body["error"],
            "Content policy violation. Please modify your prompt."
        );
    }

    #[tokio::test]
    async fn unknown_failure_falls_back_to_placeholders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::Other("model is overloaded".to_string())),
            false,
        ));

        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle", "n": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "Mock Images (generation failed)");
        assert_eq!(
            body["warning"],
            "Image generation failed: model is overloaded"
        );

        let images = body["images"].as_array().expect("images array");
        assert_eq!(images.len(), 3);
        for image in images {
            assert!(image["id"].as_str().expect("id").starts_with("mock_"));
            assert_eq!(image["revisedPrompt"], "Mock image for: a red circle");
        }
    }

    #[tokio::test]
    async fn strict_errors_surface_provider_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::Other("model is overloaded".to_string())),
            true,
        ));

        let response = app
            .oneshot(post_json(
                "/api/generate-image",
                json!({"prompt": "a red circle"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(response).await;
        assert_eq!(
            body["error"],
            "Image generation failed: model is overloaded"
        );
    }

    #[tokio::test]
    async fn image_connection_test_reports_connected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = vec![ProviderImageItem::Url {
            url: "https://provider.example/test.png".to_string(),
            revised_prompt: None,
        }];
        let app = create_router().with_state(setup_state(dir.path(), Ok(items), false));

        let response = app.oneshot(get("/api/test-image-connection")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "Connected");
        assert_eq!(body["provider"], "Mock Provider");
        assert_eq!(body["testImage"], "https://provider.example/test.png");

        // Inline payloads are reported without echoing the base64 back.
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(
            dir.path(),
            Ok(vec![inline_item(b"test image")]),
            false,
        ));
        let response = app.oneshot(get("/api/test-image-connection")).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["testImage"], "Base64 data received");
    }

    #[tokio::test]
    async fn image_connection_test_surfaces_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(
            dir.path(),
            Err(ProviderError::Other("connection refused".to_string())),
            false,
        ));

        let response = app.oneshot(get("/api/test-image-connection")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["status"], "Error");
        assert_eq!(body["message"], "Image generation connection failed");
        assert_eq!(body["error"], "connection refused");

        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::new(
            None,
            ImageStore::new(dir.path().to_path_buf(), "http://localhost:9000"),
            false,
        );
        let response = create_router()
            .with_state(state)
            .oneshot(get("/api/test-image-connection"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["status"], "Error");
        assert_eq!(body["message"], "Image generation API is not configured");
    }

    #[tokio::test]
    async fn uploads_scan_failure_names_the_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where the uploads directory should be.
        let blocked = dir.path().join("uploads");
        std::fs::write(&blocked, b"not a directory").expect("write blocker");
        let app = create_router().with_state(setup_state(&blocked, Ok(Vec::new()), false));

        let response = app.oneshot(get("/api/uploads")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Failed to read uploads folder");
        assert!(!body["message"].as_str().expect("message").is_empty());
    }

    #[tokio::test]
    async fn history_round_trips_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let response = app.clone().oneshot(get("/api/history")).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["history"], json!([]));

        for prompt in ["first", "second"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/save-to-history",
                    json!({
                        "prompt": prompt,
                        "imageUrl": "http://localhost:9000/uploads/img.png",
                        "settings": {"size": "1024x1024", "quality": "medium", "n": 1},
                        "duration": 3.5
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = read_json(response).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["item"]["prompt"], prompt);
        }

        let response = app.oneshot(get("/api/history")).await.unwrap();
        let body = read_json(response).await;
        let history = body["history"].as_array().expect("history array");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["prompt"], "second");
        assert_eq!(history[1]["prompt"], "first");
        assert_eq!(history[0]["duration"], 3.5);
    }

    #[tokio::test]
    async fn save_to_history_requires_prompt_and_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/save-to-history",
                json!({"imageUrl": "http://localhost:9000/uploads/img.png"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json("/api/save-to-history", json!({"prompt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Image URL is required");
    }

    #[tokio::test]
    async fn stored_images_are_served_with_cache_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("img_1_0.png"), b"image bytes").expect("write image");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let response = app.clone().oneshot(get("/uploads/img_1_0.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert!(response.headers().get("cache-control").is_some());
        let etag = response
            .headers()
            .get("etag")
            .expect("etag header")
            .clone();

        let request = Request::builder()
            .method("GET")
            .uri("/uploads/img_1_0.png")
            .header("if-none-match", etag)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        let response = app.oneshot(get("/uploads/missing.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_routes_return_a_json_404() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = create_router().with_state(setup_state(dir.path(), Ok(Vec::new()), false));

        let response = app.oneshot(get("/api/unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Endpoint not found");
    }
}
