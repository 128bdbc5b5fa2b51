//! Serves stored images back out of the uploads directory.

use std::io::ErrorKind;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};

use super::AppState;
use crate::constants::UPLOAD_CACHE_CONTROL;
use crate::error::AppError;

/// Streams a stored image with conditional-request cache headers.
pub(crate) async fn serve_upload_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if !is_safe_filename(&filename) {
        return Err(AppError::Validation("Invalid filename".to_string()));
    }

    let path = state.store.upload_dir().join(&filename);
    let file_meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(AppError::NotFound(format!("/uploads/{filename}"))),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("/uploads/{filename}")));
        }
        Err(err) => return Err(err.into()),
    };

    let cache = UploadCacheHeaders::from_metadata(&file_meta);
    if is_not_modified(&headers, &cache) {
        return not_modified_response(&cache);
    }

    let bytes = tokio::fs::read(&path).await?;
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(&filename));
    let builder = apply_cache_headers(builder, &cache);
    builder.body(Body::from(bytes)).map_err(AppError::from)
}

/// Cache headers derived from a stored file's metadata.
#[derive(Clone, Debug)]
pub(crate) struct UploadCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: Option<SystemTime>,
}

impl UploadCacheHeaders {
    /// Builds cache headers from filesystem metadata.
    pub(crate) fn from_metadata(file_meta: &std::fs::Metadata) -> Self {
        let modified_at = file_meta.modified().ok();
        let etag = build_etag(file_meta.len(), modified_at);
        let last_modified =
            modified_at.and_then(|modified| HeaderValue::from_str(&fmt_http_date(modified)).ok());
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }
}

fn apply_cache_headers(mut builder: Builder, cache: &UploadCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, UPLOAD_CACHE_CONTROL.as_str());
    if let Some(etag) = &cache.etag {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = &cache.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// Returns true when the request matches a not-modified response.
fn is_not_modified(headers: &HeaderMap, cache: &UploadCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag.as_ref().and_then(|value| value.to_str().ok())
                && value.split(',').any(|candidate| candidate.trim() == etag)
            {
                return true;
            }
        }
        return false;
    }

    if let (Some(if_modified_since), Some(modified_at)) =
        (headers.get(IF_MODIFIED_SINCE), cache.modified_at)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && modified_at <= since
    {
        return true;
    }

    false
}

fn not_modified_response(cache: &UploadCacheHeaders) -> Result<Response, AppError> {
    let builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    let builder = apply_cache_headers(builder, cache);
    builder.body(Body::empty()).map_err(AppError::from)
}

fn build_etag(size: u64, modified_at: Option<SystemTime>) -> Option<HeaderValue> {
    let suffix = match modified_at {
        Some(modified) => modified
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string()),
        None => "0".to_string(),
    };
    let value = format!("W/\"{}-{}\"", size, suffix);
    HeaderValue::from_str(&value).ok()
}

/// Filenames come from the URL path; anything that could escape the uploads
/// directory is rejected before it touches the filesystem.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
