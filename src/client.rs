//! Remote processing client.
//!
//! One invocation sends exactly one `generateContent` request. There is no
//! retry, backoff, or client-side timeout; the transport's own behavior
//! governs how long a call may take.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gemini::{ErrorResponse, GenerateContentRequest, GenerateContentResponse};

/// Instruction sent alongside every image.
pub const REMOVAL_INSTRUCTION: &str = "Remove the generative-AI or watermark symbol from this image. \
Fill the area where the symbol was so that it blends seamlessly with the surrounding background. \
Return only the image with no additional modification.";

/// Something that can repaint a watermark out of an image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Send a base64 image and return the base64 payload of the edited image.
    ///
    /// # Errors
    ///
    /// - [`Error::NoImageReturned`] if the response carries no image part.
    /// - [`Error::ProcessingFailed`] for any other remote or transport failure.
    async fn remove_watermark(&self, payload: &str, media_type: &str) -> Result<String>;
}

/// Why a call failed. Logged, never returned.
#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct ProcessingClient {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl ProcessingClient {
    /// Create a client bound to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialized.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// Configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, Failure> {
        let response = self
            .http
            .post(self.config.generate_content_url())
            .header("x-goog-api-key", self.config.api_key())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body).map_or_else(
                |_| String::from_utf8_lossy(&body).into_owned(),
                |envelope| envelope.error.message,
            );
            return Err(Failure::Status { status, message });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ImageEditor for ProcessingClient {
    async fn remove_watermark(&self, payload: &str, media_type: &str) -> Result<String> {
        let request = GenerateContentRequest::image_edit(payload, media_type, REMOVAL_INSTRUCTION);
        tracing::debug!(
            model = %self.config.model,
            media_type,
            payload_len = payload.len(),
            "sending watermark removal request"
        );

        let response = self.send(&request).await.map_err(|failure| {
            tracing::error!(error = %failure, "error calling Gemini API");
            Error::ProcessingFailed
        })?;

        if let Some(image) = response.first_image_payload() {
            tracing::debug!(payload_len = image.len(), "received processed image");
            return Ok(image.to_string());
        }

        tracing::error!(
            finish_reason = response.finish_reason().unwrap_or("none"),
            block_reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
                .unwrap_or("none"),
            "API returned no image part"
        );
        Err(Error::NoImageReturned)
    }
}
