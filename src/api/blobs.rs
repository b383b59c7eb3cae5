//! `/api/blobs/{digest}`: file blobs used when creating models.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::paths;
use crate::client::{ensure_not_blank, log_failure, ClientError, OllamaClient, ReadMode};

impl OllamaClient {
    /// Check whether a blob exists on the server.
    ///
    /// Unlike every other endpoint, a 404 here is an answer, not a failure:
    /// it resolves to `Ok(false)`.
    pub async fn check_blob_exists(&self, digest: &str) -> Result<bool, ClientError> {
        ensure_not_blank(digest, "digest")?;
        debug!(digest, "check blob exists");

        let request = self.request(Method::HEAD, &paths::blob(digest))?;
        match self
            .send_checked(request, ReadMode::Buffered, &CancellationToken::new())
            .await
        {
            Ok(response) => Ok(response.status() == StatusCode::OK),
            Err(ClientError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }) => Ok(false),
            Err(e) => Err(log_failure("check_blob_exists", e)),
        }
    }

    /// Upload a blob. `digest` is the SHA-256 of `content` in the form
    /// `sha256:<hex>`; the server rejects a mismatch.
    pub async fn create_blob(&self, digest: &str, content: impl Into<Bytes>) -> Result<(), ClientError> {
        ensure_not_blank(digest, "digest")?;
        let content = content.into();
        debug!(digest, bytes = content.len(), "create blob");

        let request = self
            .request(Method::POST, &paths::blob(digest))?
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content);
        self.execute(request)
            .await
            .map(drop)
            .map_err(|e| log_failure("create_blob", e))
    }
}
