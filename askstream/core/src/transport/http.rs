//! HTTP Transport
//!
//! Posts the question to the ask endpoint and streams the response body.
//!
//! # Ask endpoint
//!
//! - `POST {api_url}{ask_path}` with `{"question": ..., "sessionKey": ...}`
//! - `Accept: text/event-stream` or `text/plain` depending on framing
//! - `Authorization: Bearer <token>` when a token is configured
//!
//! The body is read on a background task that decodes UTF-8 incrementally and
//! forwards each read as one fragment.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::traits::{AskRequest, FragmentSource, Transport, FRAGMENT_CHANNEL_CAPACITY};
use super::utf8::Utf8Decoder;
use crate::config::EngineConfig;
use crate::error::{truncate_chars, ReadError, TransportError, MAX_ERROR_BODY_CHARS};

/// Ask endpoint client
#[derive(Clone, Debug)]
pub struct HttpTransport {
    /// Full ask URL
    url: String,
    /// Bearer token
    auth_token: Option<String>,
    /// Longest silence tolerated mid-body
    read_timeout: Option<Duration>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport posting to `url`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_connect_timeout(url, None)
    }

    fn with_connect_timeout(
        url: impl Into<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            auth_token: None,
            read_timeout: None,
            http_client,
        })
    }

    /// Create from engine configuration
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, TransportError> {
        let transport = Self::with_connect_timeout(config.ask_url(), config.connect_timeout())?
            .with_read_timeout(config.read_timeout());
        Ok(match &config.auth_token {
            Some(token) => transport.with_auth_token(token.clone()),
            None => transport,
        })
    }

    /// Send `Authorization: Bearer <token>`
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Fail the body with [`ReadError::Stalled`] after this much silence
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Ask URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: &AskRequest) -> Result<FragmentSource, TransportError> {
        let mut builder = self
            .http_client
            .post(&self.url)
            .header(ACCEPT, request.framing.accept_header())
            .json(&request.body());
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::Request(e.to_string())
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %self.url, "Ask request rejected as unauthorized");
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %self.url, status = status.as_u16(), "Ask request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(
            url = %self.url,
            content_type = content_type.as_deref().unwrap_or("<none>"),
            "Ask response opened"
        );

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(pump_body(response.bytes_stream(), tx, self.read_timeout));
        Ok(FragmentSource::new(content_type, rx, Some(reader)))
    }
}

/// Forward body reads as decoded fragments until the body or receiver ends
async fn pump_body<S, B>(
    stream: S,
    tx: mpsc::Sender<Result<String, ReadError>>,
    read_timeout: Option<Duration>,
) where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    tokio::pin!(stream);
    let mut utf8 = Utf8Decoder::new();

    loop {
        let next = match read_timeout {
            Some(limit) => {
                if let Ok(next) = tokio::time::timeout(limit, stream.next()).await {
                    next
                } else {
                    let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    let _ = tx.send(Err(ReadError::Stalled { after_ms })).await;
                    return;
                }
            }
            None => stream.next().await,
        };

        match next {
            Some(Ok(bytes)) => {
                let text = utf8.decode(bytes.as_ref());
                if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                    // Receiver dropped, stop reading
                    return;
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(Err(ReadError::Network(e.to_string()))).await;
                return;
            }
            None => {
                let tail = utf8.finish();
                if !tail.is_empty() {
                    let _ = tx.send(Ok(tail)).await;
                }
                return;
            }
        }
    }
}
