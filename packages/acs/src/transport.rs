//! The HTTP seam between the client and the API.
//!
//! [`Transport`] performs exactly one GET per call; retry and rate limiting
//! live in the client so that alternative transports get them too.

use async_trait::async_trait;

use crate::request::redact_key;
use crate::{AcsConfig, AcsError};

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Performs single GET requests returning JSON.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// * [`AcsError::Http`] if the request could not be completed.
    /// * [`AcsError::HttpStatus`] for a non-success status.
    /// * [`AcsError::MalformedResponse`] if the body is not JSON.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, AcsError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::Http`] if the TLS backend cannot be initialized.
    pub fn new(config: &AcsConfig) -> Result<Self, AcsError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("lowe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, AcsError> {
        let redacted = redact_key(url);
        log::debug!("GET {redacted}");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcsError::HttpStatus {
                status: status.as_u16(),
                url: redacted,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
            log::debug!("Unparseable body from {redacted} ({} bytes): {preview}", text.len());
            AcsError::MalformedResponse {
                message: format!("body from {redacted} is not JSON ({e}): {preview}"),
            }
        })
    }
}
