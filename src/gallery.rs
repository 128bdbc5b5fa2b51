//! On-demand reconciliation of the uploads directory into a gallery listing.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::constants::IMAGE_EXTENSIONS;
use crate::metadata::{self, ImageMetadata};
use crate::storage::ImageStore;

/// A stored image file merged with its optional sidecar metadata.
///
/// Recomputed on every listing request; nothing here is persisted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    /// Filename minus extension
    pub id: String,
    /// On-disk filename
    pub filename: String,
    /// Public URL the file is served under
    pub url: String,
    /// The prompt when metadata exists, otherwise the base identifier
    pub title: String,
    /// Prompt from the sidecar, empty without one
    pub prompt: String,
    /// Revised prompt from the sidecar, empty without one
    pub revised_prompt: String,
    /// Size from the sidecar, `unknown` without one
    pub size: String,
    /// Quality from the sidecar, `unknown` without one
    pub quality: String,
    /// Sidecar timestamp, falling back to the file's own
    pub created_at: DateTime<Utc>,
    /// File size in bytes
    pub file_size: u64,
}

/// Scans the uploads directory and returns the gallery, newest first.
///
/// Full rescan on every call, which is fine at single-user scale; this is the
/// first component to swap for a real index if the corpus grows. Items with
/// identical timestamps keep enumeration order (stable sort), which is not
/// guaranteed to be absolute.
pub async fn scan(store: &ImageStore) -> Result<Vec<GalleryItem>, std::io::Error> {
    let dir = store.upload_dir();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if !IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
        {
            continue;
        }
        let (Some(filename), Some(base_id)) = (
            path.file_name().and_then(|name| name.to_str()),
            path.file_stem().and_then(|stem| stem.to_str()),
        ) else {
            continue;
        };

        let file_meta = entry.metadata().await?;
        let record = read_sidecar(dir, base_id).await;
        let created_at = record
            .as_ref()
            .map(|record| record.created_at)
            .unwrap_or_else(|| filesystem_timestamp(&file_meta));

        items.push(GalleryItem {
            id: base_id.to_string(),
            filename: filename.to_string(),
            url: store.upload_url(filename),
            title: record
                .as_ref()
                .map(|record| record.prompt.clone())
                .unwrap_or_else(|| base_id.to_string()),
            prompt: record
                .as_ref()
                .map(|record| record.prompt.clone())
                .unwrap_or_default(),
            revised_prompt: record
                .as_ref()
                .map(|record| record.revised_prompt.clone())
                .unwrap_or_default(),
            size: record
                .as_ref()
                .map(|record| record.size.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            quality: record
                .as_ref()
                .map(|record| record.quality.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            created_at,
            file_size: file_meta.len(),
        });
    }

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(items)
}

/// Reads and parses the sidecar for a base identifier. Absence and parse
/// failures both come back as `None`; only the latter is worth a warning.
async fn read_sidecar(dir: &Path, base_id: &str) -> Option<ImageMetadata> {
    let path = dir.join(metadata::sidecar_filename(base_id));
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn!("Could not read metadata for {base_id}: {err}");
            return None;
        }
    };
    match metadata::decode(&bytes) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("Could not parse metadata for {base_id}: {err}");
            None
        }
    }
}

fn filesystem_timestamp(file_meta: &std::fs::Metadata) -> DateTime<Utc> {
    file_meta
        .created()
        .or_else(|_| file_meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
