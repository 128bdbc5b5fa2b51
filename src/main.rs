use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use imageforge::config::setup_logging;
use imageforge::provider::{ImageProvider, OpenAiImageProvider};
use imageforge::storage::ImageStore;
use tracing::{error, warn};

#[tokio::main(flavor = "multi_thread", worker_threads = 32)]
async fn main() {
    let cli = imageforge::cli::CliOptions::parse();

    let _ = setup_logging(cli.debug);

    if let Err(err) = tokio::fs::create_dir_all(&cli.upload_dir).await {
        error!(
            "Failed to create upload directory {}: {}",
            cli.upload_dir.display(),
            err
        );
        return;
    }

    let provider: Option<Arc<dyn ImageProvider>> = match &cli.openai_api_key {
        Some(api_key) => match OpenAiImageProvider::new(
            &cli.api_base,
            api_key.clone(),
            cli.image_model.clone(),
            Duration::from_secs(cli.provider_timeout_secs),
        ) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(err) => {
                error!("Invalid API base URL {}: {}", cli.api_base, err);
                return;
            }
        },
        None => {
            warn!("No API key configured, generation requests will fail");
            None
        }
    };

    let public_url = cli
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", cli.port));
    let store = ImageStore::new(cli.upload_dir.clone(), &public_url);

    if let Err(err) = imageforge::web::setup_server(
        &cli.listen_address,
        cli.port,
        provider,
        store,
        cli.strict_errors,
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
