//! `/api/embeddings`.

use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use crate::api::paths;
use crate::client::{ensure_not_blank, log_failure, ClientError, OllamaClient};
use crate::model::EmbeddingResponse;
use crate::options::EmbeddingOptions;

/// Embeddings are never streamed, so the wire request is the options
/// object as is.
#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    #[serde(flatten)]
    pub options: &'a EmbeddingOptions,
}

impl<'a> EmbeddingRequest<'a> {
    pub fn new(options: &'a EmbeddingOptions) -> Self {
        Self { options }
    }
}

impl OllamaClient {
    /// Compute the embedding of a prompt.
    ///
    /// An empty embedding vector is treated as a deserialization failure.
    pub async fn embeddings(&self, options: &EmbeddingOptions) -> Result<EmbeddingResponse, ClientError> {
        ensure_not_blank(&options.model, "model")?;
        ensure_not_blank(&options.prompt, "prompt")?;
        debug!(model = %options.model, "generate embedding");

        let request = self
            .request(Method::POST, paths::EMBEDDINGS)?
            .json(&EmbeddingRequest::new(options));

        self.execute_json(request, "EmbeddingResponse", |r: &EmbeddingResponse| {
            !r.embedding.is_empty()
        })
        .await
        .map_err(|e| log_failure("embeddings", e))
    }
}
