//! HTTP Backend Implementation
//!
//! Talks to the agent backend's trigger endpoint:
//!
//! - `POST {endpoint}/triggers/chat` with `stream: true` answers with a
//!   `text/event-stream` body
//! - the same call with `stream: false` answers with one JSON object
//!
//! Both carry the bearer credential. The single-shot call is capped by
//! `request_timeout` end to end. The streaming call only bounds the connect
//! phase by `request_timeout`; after that `stream_timeout` is the longest
//! silence allowed between reads, so a long reply that keeps producing
//! chunks is never cut off.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::ACCEPT;
use tracing::debug;

use super::traits::{ByteStream, ChatBackend, ChatTriggerRequest, TriggerResponse};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};

/// Media type requested for streaming turns
const EVENT_STREAM: &str = "text/event-stream";

/// HTTP agent backend
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// API base, e.g. `http://localhost:8000/api/v1`
    base_url: String,
    /// Client for streaming turns
    stream_client: reqwest::Client,
    /// Client for single-shot turns
    request_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        stream_timeout: Duration,
    ) -> Result<Self> {
        let build = |builder: reqwest::ClientBuilder| {
            builder
                .build()
                .map_err(|e| ChatError::ClientBuild(e.to_string()))
        };

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stream_client: build(
                reqwest::Client::builder()
                    .connect_timeout(request_timeout)
                    .read_timeout(stream_timeout),
            )?,
            request_client: build(reqwest::Client::builder().timeout(request_timeout))?,
        })
    }

    /// Create from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.api.endpoint_url.clone(),
            Duration::from_millis(config.api.request_timeout_ms),
            Duration::from_millis(config.api.stream_timeout_ms),
        )
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get chat trigger endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/triggers/chat", self.base_url)
    }
}

/// Turn a non-success response into [`ChatError::HttpStatus`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatBackend for HttpBackend {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn open_stream(
        &self,
        request: &ChatTriggerRequest,
        credential: &str,
    ) -> Result<ByteStream> {
        let url = self.chat_url();
        debug!(url = %url, "Opening event stream");

        let response = self
            .stream_client
            .post(&url)
            .header(ACCEPT, EVENT_STREAM)
            .bearer_auth(credential)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;

        // An explicitly empty body has nothing to read
        if response.content_length() == Some(0) {
            return Err(ChatError::MissingBody);
        }

        let body = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(ChatError::from);
        Ok(body.boxed())
    }

    async fn send(
        &self,
        request: &ChatTriggerRequest,
        credential: &str,
    ) -> Result<TriggerResponse> {
        let url = self.chat_url();
        debug!(url = %url, "Sending single-shot turn");

        let response = self
            .request_client
            .post(&url)
            .bearer_auth(credential)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<TriggerResponse>().await?)
    }
}
