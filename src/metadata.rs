//! Sidecar metadata written next to each stored image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::METADATA_SUFFIX;
use crate::generation::{GenerationRequest, ImageQuality, ImageSize};

/// Generation parameters persisted alongside an image file.
///
/// Written once when the image lands on disk and read-only afterwards. If the
/// image file is deleted the sidecar is orphaned; the gallery just ignores it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// The prompt the user submitted
    pub prompt: String,
    /// Requested output dimensions
    pub size: ImageSize,
    /// Requested rendering quality
    pub quality: ImageQuality,
    /// Provider rewording of the prompt, or the original if none was given
    pub revised_prompt: String,
    /// When the image was stored
    pub created_at: DateTime<Utc>,
}

impl ImageMetadata {
    /// Builds the sidecar record for a freshly stored image.
    pub fn for_request(request: &GenerationRequest, revised_prompt: Option<&str>) -> Self {
        Self {
            prompt: request.prompt.clone(),
            size: request.size,
            quality: request.quality,
            revised_prompt: revised_prompt.unwrap_or(&request.prompt).to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Serializes a metadata record as pretty-printed JSON with stable field names.
pub fn encode(record: &ImageMetadata) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(record)
}

/// Parses a metadata sidecar.
///
/// Fails if the content is not JSON or a required field is missing; callers
/// treat that as "metadata absent" rather than aborting.
pub fn decode(bytes: &[u8]) -> Result<ImageMetadata, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// The sidecar filename for an image's base identifier, eg
/// `img_1700000000000_0_meta.json`.
pub fn sidecar_filename(base_id: &str) -> String {
    format!("{base_id}{METADATA_SUFFIX}.json")
}
