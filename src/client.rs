//! Core client type, error type and request dispatch.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::http::{add_extra_headers, build_http_client};
use crate::ndjson::LineReader;
use crate::options::ClientOptions;
use crate::stream::StreamingResponse;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be sent or no response was received.
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Timed out after {0:?} waiting for response headers")]
    Timeout(Duration),

    /// A response was received but its status indicates failure.
    #[error("HTTP {status}: {}", .body.as_deref().unwrap_or("<no body>"))]
    Status {
        status: StatusCode,
        body: Option<String>,
    },

    /// The service answered with a success status but the body does not
    /// map to the expected shape.
    #[error("Cannot deserialize response into {type_name}: {reason}")]
    Deserialization {
        type_name: &'static str,
        json: String,
        reason: String,
    },

    /// One line of an event stream failed to decode: not UTF-8, not the
    /// expected JSON, or longer than the reader accepts.
    #[error("Malformed stream line {line:?}: {source}")]
    MalformedLine {
        line: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to read response body: {0}")]
    Body(#[source] std::io::Error),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Stream already closed")]
    StreamClosed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status code, when a response was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response text: the error body of a status failure, or the
    /// content that could not be deserialized.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ClientError::Status { body, .. } => body.as_deref(),
            ClientError::Deserialization { json, .. } => Some(json),
            _ => None,
        }
    }

    /// No response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

/// How the response body of a dispatched request is consumed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ReadMode {
    /// Read the whole body before returning.
    Buffered,
    /// Return once headers are in; the body is read by the caller.
    Streaming,
}

/// Client for an Ollama server.
///
/// Cheap to clone: clones share the underlying connection pool.
///
/// # Example
/// ```no_run
/// use ollama_core::{GenerateCompletionOptions, OllamaClient};
///
/// # async fn run() -> Result<(), ollama_core::ClientError> {
/// let client = OllamaClient::new("http://localhost:11434")?;
/// let completion = client
///     .generate(&GenerateCompletionOptions::new("llama3", "Why is the sky blue?"))
///     .await?;
/// println!("{}", completion.response);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: Url,
    options: ClientOptions,
}

impl OllamaClient {
    /// Create a client for the server at `base_url` with default options.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_options(ClientOptions::default().with_base_url(base_url))
    }

    /// Create a client from explicit options.
    pub fn with_options(options: ClientOptions) -> Result<Self, ClientError> {
        let base_url = parse_base_url(&options.base_url)?;
        let http = build_http_client(&options).map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            base_url,
            options,
        })
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// Timeouts and proxy settings are whatever `http` was built with.
    pub fn with_http_client(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let options = ClientOptions::default().with_base_url(base_url);
        Ok(Self {
            http,
            base_url: parse_base_url(&options.base_url)?,
            options,
        })
    }

    /// Create a client configured from the environment (`OLLAMA_HOST`).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::with_options(ClientOptions::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Start a request against an endpoint path relative to the base URL.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid endpoint path '{path}': {e}")))?;
        Ok(add_extra_headers(
            self.http.request(method, url),
            &self.options.extra_headers,
        ))
    }

    /// Send a request and check its status.
    ///
    /// Transport failures carry no status code. A non-success status reads
    /// the body best-effort for diagnostics and fails with
    /// [`ClientError::Status`]. The returned response's body is untouched.
    pub(crate) async fn send_checked(
        &self,
        request: RequestBuilder,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        let timeout = self.options.timeout;
        let send = async {
            match (mode, timeout) {
                (ReadMode::Buffered, Some(limit)) => {
                    request.timeout(limit).send().await.map_err(ClientError::Transport)
                }
                (ReadMode::Streaming, Some(limit)) => tokio::time::timeout(limit, request.send())
                    .await
                    .map_err(|_| ClientError::Timeout(limit))
                    .and_then(|sent| sent.map_err(ClientError::Transport)),
                (_, None) => request.send().await.map_err(ClientError::Transport),
            }
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            body = response.text() => body.ok().filter(|b| !b.is_empty()),
        };
        debug!(%status, body = body.as_deref().unwrap_or_default(), "request failed");
        Err(ClientError::Status { status, body })
    }

    /// Send a request and read the whole body as text.
    ///
    /// A body that fails after the status line arrived is a [`ClientError::Body`]
    /// failure, the same as in a streaming read.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let cancel = CancellationToken::new();
        let response = self.send_checked(request, ReadMode::Buffered, &cancel).await?;
        response
            .text()
            .await
            .map_err(|e| ClientError::Body(std::io::Error::other(e)))
    }

    /// Send a request and decode the body into `T`.
    ///
    /// `is_valid` rejects bodies that parse but lack a field the response
    /// cannot be meaningful without; both cases fail with
    /// [`ClientError::Deserialization`].
    pub(crate) async fn execute_json<T, F>(
        &self,
        request: RequestBuilder,
        type_name: &'static str,
        is_valid: F,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> bool,
    {
        let json = self.execute(request).await?;
        trace!(type_name, content = %json, "response content");
        decode_checked(json, type_name, is_valid)
    }

    /// Send a request and hand the live response to a [`StreamingResponse`].
    ///
    /// Returns as soon as the headers are in; each line of the body is
    /// decoded only when the caller asks for the next item.
    pub(crate) async fn execute_streaming<T>(
        &self,
        request: RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self.send_checked(request, ReadMode::Streaming, &cancel).await?;
        trace!(status = %response.status(), "streaming response headers received");
        Ok(StreamingResponse::from_response(response, cancel, |response| {
            LineReader::<T>::from_response(response).into_stream()
        }))
    }
}

/// Decode `json` into `T`, then apply a validity check.
pub(crate) fn decode_checked<T, F>(json: String, type_name: &'static str, is_valid: F) -> Result<T, ClientError>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> bool,
{
    match serde_json::from_str::<T>(&json) {
        Ok(value) if is_valid(&value) => Ok(value),
        Ok(_) => Err(ClientError::Deserialization {
            type_name,
            json,
            reason: "required field is missing or empty".to_string(),
        }),
        Err(e) => Err(ClientError::Deserialization {
            type_name,
            reason: e.to_string(),
            json,
        }),
    }
}

/// Reject blank caller input before anything is sent.
pub(crate) fn ensure_not_blank(value: &str, name: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}

/// Log a failed call at the boundary, then hand the error back.
pub(crate) fn log_failure(operation: &'static str, error: ClientError) -> ClientError {
    if !error.is_cancelled() {
        warn!(operation, error = %error, "request failed");
    }
    error
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Config("base URL must not be empty".to_string()));
    }

    // A base without a trailing slash would have its last segment replaced
    // by `Url::join`.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&normalized)
        .map_err(|e| ClientError::Config(format!("invalid base URL '{base_url}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!("invalid base URL '{base_url}'")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        #[serde(default)]
        model: String,
    }

    #[test]
    fn test_parse_base_url() {
        let url = parse_base_url("http://localhost:11434").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/");
        assert_eq!(url.join("api/chat").unwrap().as_str(), "http://localhost:11434/api/chat");

        let nested = parse_base_url("http://proxy.local/ollama").unwrap();
        assert_eq!(nested.join("api/tags").unwrap().as_str(), "http://proxy.local/ollama/api/tags");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(OllamaClient::new(""), Err(ClientError::Config(_))));
        assert!(matches!(OllamaClient::new("   "), Err(ClientError::Config(_))));
        assert!(matches!(OllamaClient::new("invalid url"), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new("http://127.0.0.1:11434").unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:11434/");
    }

    #[test]
    fn test_decode_checked() {
        let ok: Named = decode_checked(r#"{"model":"llama3"}"#.to_string(), "Named", |n: &Named| {
            !n.model.is_empty()
        })
        .unwrap();
        assert_eq!(ok.model, "llama3");

        let missing = decode_checked("{}".to_string(), "Named", |n: &Named| !n.model.is_empty());
        match missing {
            Err(ClientError::Deserialization { type_name, json, .. }) => {
                assert_eq!(type_name, "Named");
                assert_eq!(json, "{}");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let garbage = decode_checked("not json".to_string(), "Named", |_: &Named| true);
        assert!(matches!(garbage, Err(ClientError::Deserialization { .. })));
    }

    #[test]
    fn test_ensure_not_blank() {
        assert!(ensure_not_blank("llama3", "model").is_ok());
        assert!(matches!(
            ensure_not_blank("  ", "model"),
            Err(ClientError::InvalidArgument(msg)) if msg.contains("model")
        ));
    }

    #[test]
    fn test_error_accessors() {
        let status = ClientError::Status {
            status: StatusCode::NOT_FOUND,
            body: Some("model not found".to_string()),
        };
        assert_eq!(status.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(status.response_body(), Some("model not found"));
        assert!(!status.is_transport());
        assert!(status.to_string().contains("404"));

        let timeout = ClientError::Timeout(Duration::from_secs(1));
        assert!(timeout.is_transport());
        assert_eq!(timeout.status_code(), None);

        assert!(ClientError::Cancelled.is_cancelled());
    }
}
