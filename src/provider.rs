//! External image-generation provider client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::generation::GenerationRequest;

/// One item from a provider response.
///
/// Providers answer with either a hosted URL or a base64 payload; a tagged
/// union keeps the dispatch to a match instead of field probing.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderImageItem {
    /// Hosted image the provider serves itself
    Url {
        /// Where the provider put the image
        url: String,
        /// Provider rewording of the prompt, if any
        revised_prompt: Option<String>,
    },
    /// Base64-encoded image bytes we have to persist ourselves
    Inline {
        /// Standard base64 payload
        b64_json: String,
        /// Provider rewording of the prompt, if any
        revised_prompt: Option<String>,
    },
}

impl ProviderImageItem {
    /// The provider's rewording of the prompt, when it supplied one.
    pub fn revised_prompt(&self) -> Option<&str> {
        match self {
            ProviderImageItem::Url { revised_prompt, .. }
            | ProviderImageItem::Inline { revised_prompt, .. } => revised_prompt.as_deref(),
        }
    }
}

/// Why a provider call failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderError {
    /// Credentials rejected
    InvalidApiKey,
    /// Rate or quota limit hit
    QuotaExceeded,
    /// Prompt rejected by the provider's content policy
    ContentPolicy,
    /// Anything else: network failures, timeouts, unexpected payloads
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidApiKey => f.write_str("provider rejected the API key"),
            Self::QuotaExceeded => f.write_str("provider quota exceeded"),
            Self::ContentPolicy => f.write_str("prompt rejected by content policy"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// The upstream image-generation capability.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short label used in the response `source` field.
    fn name(&self) -> &str;

    /// Generates `request.count` images for the prompt.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ProviderImageItem>, ProviderError>;
}

/// Request body for POST /v1/images/generations
/// Docs: https://platform.openai.com/docs/api-reference/images
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Client for an OpenAI-compatible images endpoint.
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiImageProvider {
    /// Builds a client against `api_base` (eg `https://api.openai.com/v1`).
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!(
            "{}/images/generations",
            api_base.trim_end_matches('/')
        ))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            timeout,
        })
    }

    async fn call(&self, request: &GenerationRequest) -> Result<Vec<ProviderImageItem>, ProviderError> {
        let req_body = ImagesGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            n: request.count,
            size: request.size.as_str(),
            quality: request.quality.as_str(),
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await
            .map_err(|err| ProviderError::Other(format!("images request failed: {err}")))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ProviderError::Other(format!("failed reading images body: {err}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &bytes));
        }

        let parsed: ImagesGenerateResponse = serde_json::from_slice(&bytes).map_err(|err| {
            ProviderError::Other(format!("failed to parse images response: {err}"))
        })?;

        let mut items = Vec::with_capacity(parsed.data.len());
        for item in parsed.data {
            match (item.url, item.b64_json) {
                (Some(url), _) => items.push(ProviderImageItem::Url {
                    url,
                    revised_prompt: item.revised_prompt,
                }),
                (None, Some(b64_json)) => items.push(ProviderImageItem::Inline {
                    b64_json,
                    revised_prompt: item.revised_prompt,
                }),
                (None, None) => {
                    warn!("Provider item missing both url and b64_json, skipping");
                }
            }
        }

        if items.is_empty() {
            return Err(ProviderError::Other("No image data returned".to_string()));
        }

        debug!("Provider returned {} image item(s)", items.len());
        Ok(items)
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &str {
        "OpenAI Images API"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ProviderImageItem>, ProviderError> {
        match tokio::time::timeout(self.timeout, self.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Other(format!(
                "provider call timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Maps a non-success provider response to the error taxonomy, preferring the
/// machine-readable error code over the HTTP status.
fn classify_failure(status: StatusCode, body: &[u8]) -> ProviderError {
    let parsed: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let detail = parsed.error.unwrap_or_default();

    match detail.code.as_deref() {
        Some("invalid_api_key") => return ProviderError::InvalidApiKey,
        Some("insufficient_quota") => return ProviderError::QuotaExceeded,
        Some("content_policy_violation") => return ProviderError::ContentPolicy,
        _ => {}
    }

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::InvalidApiKey,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::QuotaExceeded,
        _ => ProviderError::Other(detail.message.unwrap_or_else(|| {
            format!(
                "provider error {status}: {}",
                String::from_utf8_lossy(body)
            )
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::generation::GenerateImageBody;

    #[tokio::test]
    async fn slow_provider_calls_hit_the_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        // Accept connections and hold them open without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = OpenAiImageProvider::new(
            &format!("http://{addr}/v1"),
            "test-key".to_string(),
            "gpt-image-1".to_string(),
            Duration::from_millis(50),
        )
        .expect("provider");
        let request = GenerationRequest::validate(GenerateImageBody {
            prompt: Some("a red circle".to_string()),
            ..Default::default()
        })
        .expect("valid request");

        let err = provider.generate(&request).await.expect_err("never answers");
        let ProviderError::Other(message) = err else {
            panic!("expected a generic provider failure");
        };
        assert!(message.contains("timed out"), "{message}");
    }

    #[test]
    fn error_codes_beat_http_status() {
        let body = br#"{"error":{"code":"content_policy_violation","message":"nope"}}"#;
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, body),
            ProviderError::ContentPolicy
        );

        let body = br#"{"error":{"code":"invalid_api_key","message":"bad key"}}"#;
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, body),
            ProviderError::InvalidApiKey
        );

        let body = br#"{"error":{"code":"insufficient_quota","message":"slow down"}}"#;
        assert_eq!(
            classify_failure(StatusCode::OK, body),
            ProviderError::QuotaExceeded
        );
    }

    #[test]
    fn status_classification_covers_auth_and_quota() {
        assert_eq!(
            classify_failure(StatusCode::UNAUTHORIZED, b"{}"),
            ProviderError::InvalidApiKey
        );
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, b"{}"),
            ProviderError::QuotaExceeded
        );
    }

    #[test]
    fn unknown_failures_carry_the_provider_message() {
        let body = br#"{"error":{"message":"model is overloaded"}}"#;
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err, ProviderError::Other("model is overloaded".to_string()));
    }
}
