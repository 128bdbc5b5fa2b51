//! Generation request types and validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_IMAGE_COUNT, MIN_IMAGE_COUNT};
use crate::error::AppError;

/// Output dimensions supported by the images API.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1024x1024
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    /// 1024x1536
    #[serde(rename = "1024x1536")]
    Portrait,
    /// 1536x1024
    #[serde(rename = "1536x1024")]
    Landscape,
}

impl ImageSize {
    /// Every supported size, in the order we list them in error messages.
    pub const ALL: [ImageSize; 3] = [ImageSize::Square, ImageSize::Portrait, ImageSize::Landscape];

    /// The wire form, eg `1024x1024`.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Portrait => "1024x1536",
            ImageSize::Landscape => "1536x1024",
        }
    }

    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ImageSize::Square => (1024, 1024),
            ImageSize::Portrait => (1024, 1536),
            ImageSize::Landscape => (1536, 1024),
        }
    }

    fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|size| size.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1024x1024" => Ok(ImageSize::Square),
            "1024x1536" => Ok(ImageSize::Portrait),
            "1536x1024" => Ok(ImageSize::Landscape),
            _ => Err(()),
        }
    }
}

/// Rendering quality supported by the images API.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    /// Fixed medium quality
    #[default]
    Medium,
    /// Let the provider pick
    Auto,
}

impl ImageQuality {
    /// The wire form, eg `medium`.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::Medium => "medium",
            ImageQuality::Auto => "auto",
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "medium" => Ok(ImageQuality::Medium),
            "auto" => Ok(ImageQuality::Auto),
            _ => Err(()),
        }
    }
}

/// Raw body of `POST /api/generate-image`, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateImageBody {
    /// Text prompt, required
    pub prompt: Option<String>,
    /// Requested size, defaults to 1024x1024
    pub size: Option<String>,
    /// Requested quality, defaults to medium
    pub quality: Option<String>,
    /// How many images, defaults to 1
    pub n: Option<i64>,
}

/// A generation request that has passed field validation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// The user's prompt, trimmed and non-empty
    pub prompt: String,
    /// Output dimensions
    pub size: ImageSize,
    /// Rendering quality
    pub quality: ImageQuality,
    /// Number of images, within 1..=10
    pub count: u8,
}

impl GenerationRequest {
    /// Validates a raw request body, naming the offending field on failure.
    pub fn validate(body: GenerateImageBody) -> Result<Self, AppError> {
        let prompt = body
            .prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty())
            .ok_or_else(|| AppError::Validation("Prompt is required".to_string()))?;

        let size = match body.size.as_deref() {
            None => ImageSize::default(),
            Some(raw) => raw.parse().map_err(|()| {
                AppError::Validation(format!(
                    "Invalid size. Must be one of: {}",
                    ImageSize::valid_values()
                ))
            })?,
        };

        let quality = match body.quality.as_deref() {
            None => ImageQuality::default(),
            Some(raw) => raw.parse().map_err(|()| {
                AppError::Validation("Invalid quality. Must be one of: medium, auto".to_string())
            })?,
        };

        let count = match body.n {
            None => MIN_IMAGE_COUNT,
            Some(n) if (i64::from(MIN_IMAGE_COUNT)..=i64::from(MAX_IMAGE_COUNT)).contains(&n) => {
                n as u8
            }
            Some(_) => {
                return Err(AppError::Validation(
                    "Number of images must be between 1 and 10".to_string(),
                ));
            }
        };

        Ok(Self {
            prompt,
            size,
            quality,
            count,
        })
    }

    /// Settings snapshot echoed back to the client.
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            size: self.size,
            quality: self.quality,
            n: self.count,
        }
    }
}

/// The size/quality/count triple echoed in responses and kept in history.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Output dimensions
    pub size: ImageSize,
    /// Rendering quality
    pub quality: ImageQuality,
    /// Number of images requested
    pub n: u8,
}

/// One image produced for a generation request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Unique within the request: request millis plus item index
    pub id: String,
    /// Remote URL, local upload URL, or inline data URI
    pub url: String,
    /// Provider rewording of the prompt, falling back to the original
    pub revised_prompt: String,
}
