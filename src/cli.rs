//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "IMAGEFORGE_DEBUG")]
    /// Enable debug logging. Env: IMAGEFORGE_DEBUG
    pub debug: bool,

    #[clap(long, short, default_value = "9000", env = "IMAGEFORGE_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: IMAGEFORGE_PORT
    pub port: NonZeroU16,

    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "IMAGEFORGE_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: IMAGEFORGE_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "IMAGEFORGE_PUBLIC_URL")]
    /// Public base URL used in returned image links, eg `https://img.example.com`.
    /// Defaults to `http://localhost:<port>`.
    /// Env: IMAGEFORGE_PUBLIC_URL
    pub public_url: Option<String>,

    #[clap(
        long,
        short,
        default_value_os_t = crate::constants::UPLOAD_DIR.clone(),
        env = "IMAGEFORGE_UPLOAD_DIR"
    )]
    /// Directory where generated images and their metadata sidecars land,
    /// defaults to `./uploads`. Env: IMAGEFORGE_UPLOAD_DIR
    pub upload_dir: PathBuf,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// Image provider API key. When unset, generation requests fail with a
    /// configuration error. Env: OPENAI_API_KEY
    pub openai_api_key: Option<String>,

    #[clap(
        long,
        default_value = "https://api.openai.com/v1",
        env = "IMAGEFORGE_API_BASE"
    )]
    /// Base URL of the images API.
    /// Env: IMAGEFORGE_API_BASE
    pub api_base: String,

    #[clap(long, default_value = "gpt-image-1", env = "IMAGEFORGE_IMAGE_MODEL")]
    /// Image model or deployment name.
    /// Env: IMAGEFORGE_IMAGE_MODEL
    pub image_model: String,

    #[clap(long, default_value = "120", env = "IMAGEFORGE_PROVIDER_TIMEOUT")]
    /// Upper bound in seconds on a single provider call.
    /// Env: IMAGEFORGE_PROVIDER_TIMEOUT
    pub provider_timeout_secs: u64,

    #[clap(long, env = "IMAGEFORGE_STRICT_ERRORS")]
    /// Surface unclassified provider failures as errors instead of falling
    /// back to placeholder images. Env: IMAGEFORGE_STRICT_ERRORS
    pub strict_errors: bool,
}
