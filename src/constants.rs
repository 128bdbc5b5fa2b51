//! Shared constants/setters for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;

/// The default place we put generated images
pub static UPLOAD_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./uploads"));

/// Suffix (before `.json`) that pairs a metadata sidecar with its image file
pub const METADATA_SUFFIX: &str = "_meta";

/// Extensions the gallery recognises as images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// How many history entries we keep before evicting the oldest
pub const HISTORY_CAPACITY: usize = 50;

/// Inclusive bounds on the number of images in one generation request
pub const MIN_IMAGE_COUNT: u8 = 1;
/// See [MIN_IMAGE_COUNT]
pub const MAX_IMAGE_COUNT: u8 = 10;

/// Max age (in seconds) for upload cache entries.
pub const UPLOAD_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Shared cache max age (in seconds) for upload cache entries.
pub const UPLOAD_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24;

/// Stale-while-revalidate window (in seconds) for upload cache entries.
pub const UPLOAD_CACHE_STALE_WHILE_REVALIDATE_SECONDS: u64 = 60 * 60 * 24;

/// Cache-Control value for stored image responses.
pub static UPLOAD_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
        UPLOAD_CACHE_MAX_AGE_SECONDS,
        UPLOAD_CACHE_S_MAXAGE_SECONDS,
        UPLOAD_CACHE_STALE_WHILE_REVALIDATE_SECONDS
    )
});
