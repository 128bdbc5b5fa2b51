//! Writes provider images and their metadata sidecars to the uploads directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose;
use tracing::{info, warn};

use crate::generation::{GeneratedImage, GenerationRequest};
use crate::metadata::{self, ImageMetadata};
use crate::provider::ProviderImageItem;

/// Result of persisting one provider item.
#[derive(Clone, Debug)]
pub struct StoredImage {
    /// The client-facing record
    pub image: GeneratedImage,
    /// True when a decode or disk failure degraded us to an inline data URI
    pub degraded: bool,
}

/// Destination directory plus the public URL stored images are served under.
#[derive(Clone, Debug)]
pub struct ImageStore {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    /// Builds a store rooted at `upload_dir`, linking files under
    /// `<public_base_url>/uploads/`.
    pub fn new(upload_dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            upload_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The directory images and sidecars land in.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Public URL for a stored filename.
    pub fn upload_url(&self, filename: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, filename)
    }

    /// Base identifier for item `index` of a request stamped `request_millis`.
    /// Unique within a request; collisions across requests would need two
    /// requests in the same millisecond with the same index.
    pub fn image_id(request_millis: i64, index: usize) -> String {
        format!("img_{request_millis}_{index}")
    }

    /// Persists one provider item and returns the client-facing record.
    ///
    /// URL items pass through untouched. Inline items are decoded and written
    /// next to a metadata sidecar; any decode or disk failure degrades to an
    /// inline data URI instead of failing the request.
    pub async fn store_item(
        &self,
        item: ProviderImageItem,
        request: &GenerationRequest,
        id: &str,
    ) -> StoredImage {
        let revised_prompt = item.revised_prompt().unwrap_or(&request.prompt).to_string();

        match item {
            ProviderImageItem::Url { url, .. } => StoredImage {
                image: GeneratedImage {
                    id: id.to_string(),
                    url,
                    revised_prompt,
                },
                degraded: false,
            },
            ProviderImageItem::Inline { b64_json, .. } => {
                match self.write_inline(&b64_json, request, id, &revised_prompt).await {
                    Ok(url) => StoredImage {
                        image: GeneratedImage {
                            id: id.to_string(),
                            url,
                            revised_prompt,
                        },
                        degraded: false,
                    },
                    Err(err) => {
                        warn!("Failed to save image {id}: {err:#}, returning inline data URI");
                        StoredImage {
                            image: GeneratedImage {
                                id: id.to_string(),
                                url: format!("data:image/png;base64,{b64_json}"),
                                revised_prompt,
                            },
                            degraded: true,
                        }
                    }
                }
            }
        }
    }

    async fn write_inline(
        &self,
        b64_json: &str,
        request: &GenerationRequest,
        id: &str,
        revised_prompt: &str,
    ) -> Result<String, anyhow::Error> {
        let bytes = general_purpose::STANDARD
            .decode(b64_json)
            .context("Failed to base64-decode image")?;
        let extension = sniff_extension(&bytes);

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.upload_dir.display()))?;

        let filename = format!("{id}.{extension}");
        tokio::fs::write(self.upload_dir.join(&filename), &bytes)
            .await
            .with_context(|| format!("Failed to write {filename}"))?;

        let record = ImageMetadata::for_request(request, Some(revised_prompt));
        let sidecar = metadata::sidecar_filename(id);
        let encoded = metadata::encode(&record).context("Failed to encode metadata")?;
        tokio::fs::write(self.upload_dir.join(&sidecar), encoded)
            .await
            .with_context(|| format!("Failed to write {sidecar}"))?;

        info!("Image saved as {filename} with metadata");
        Ok(self.upload_url(&filename))
    }
}

/// Picks a file extension by sniffing the image bytes, defaulting to png when
/// the format is unrecognised.
fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => "png",
    }
}
