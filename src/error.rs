//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, info, warn};

/// definitions for the imageforge application.
#[derive(Debug)]
pub enum AppError {
    /// Request fields outside their enumerated domains
    Validation(String),
    /// Provider rejected our credentials
    InvalidApiKey,
    /// Provider rate/quota limit hit
    QuotaExceeded,
    /// Provider rejected the prompt content
    ContentPolicy,
    /// When a requested resource is not found
    NotFound(String),
    /// No API key was configured at startup
    ProviderNotConfigured,
    /// Provider failed and placeholder fallback is disabled
    ProviderUnavailable(String),
    /// Rescan of the uploads directory failed
    UploadsScanFailed(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for AppError {
    fn from(err: axum::http::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

fn json_error(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::Validation(message) => {
                info!("Validation failure: {}", message);
                json_error(StatusCode::BAD_REQUEST, message)
            }
            AppError::InvalidApiKey => {
                warn!("Provider rejected the configured API key");
                json_error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid OpenAI API key".to_string(),
                )
            }
            AppError::QuotaExceeded => {
                warn!("Provider quota exceeded");
                json_error(
                    StatusCode::TOO_MANY_REQUESTS,
                    "OpenAI API quota exceeded".to_string(),
                )
            }
            AppError::ContentPolicy => {
                info!("Prompt rejected by provider content policy");
                json_error(
                    StatusCode::BAD_REQUEST,
                    "Content policy violation. Please modify your prompt.".to_string(),
                )
            }
            AppError::NotFound(url) => {
                info!("404 {url}");
                json_error(StatusCode::NOT_FOUND, "Not Found".to_string())
            }
            AppError::ProviderNotConfigured => {
                error!("Generation requested but no API key is configured");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Image generation API is not configured".to_string(),
                )
            }
            AppError::ProviderUnavailable(message) => {
                error!("Provider failure surfaced to client: {}", message);
                json_error(
                    StatusCode::BAD_GATEWAY,
                    format!("Image generation failed: {message}"),
                )
            }
            AppError::UploadsScanFailed(message) => {
                error!("Error reading uploads folder: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to read uploads folder",
                        "message": message
                    })),
                )
                    .into_response()
            }
            AppError::InternalServerError(message) => {
                error!("Internal server error: {}", message);
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}
