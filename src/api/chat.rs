//! `/api/chat`: chat completion, streaming and buffered.

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::paths;
use crate::client::{ensure_not_blank, log_failure, ClientError, OllamaClient};
use crate::model::ChatCompletion;
use crate::options::ChatCompletionOptions;
use crate::stream::StreamingResponse;

/// Wire request for `/api/chat`: the caller's options plus the stream flag.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    #[serde(flatten)]
    pub options: &'a ChatCompletionOptions,
    pub stream: bool,
}

impl<'a> ChatRequest<'a> {
    pub fn new(options: &'a ChatCompletionOptions, stream: bool) -> Self {
        Self { options, stream }
    }
}

impl OllamaClient {
    /// Send a conversation and wait for the whole reply.
    ///
    /// A success response without a model name is rejected as a
    /// deserialization failure.
    pub async fn chat(&self, options: &ChatCompletionOptions) -> Result<ChatCompletion, ClientError> {
        ensure_not_blank(&options.model, "model")?;
        debug!(model = %options.model, messages = options.messages.len(), "chat completion");

        let request = self
            .request(Method::POST, paths::CHAT)?
            .json(&ChatRequest::new(options, false));

        self.execute_json(request, "ChatCompletion", |c: &ChatCompletion| {
            !c.model.trim().is_empty()
        })
        .await
        .map_err(|e| log_failure("chat", e))
    }

    /// Send a conversation and stream the reply as it is generated.
    ///
    /// Returns once response headers arrive. The last item has `done: true`
    /// and carries the generation metrics.
    pub async fn chat_stream(
        &self,
        options: &ChatCompletionOptions,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<ChatCompletion>, ClientError> {
        ensure_not_blank(&options.model, "model")?;
        debug!(model = %options.model, messages = options.messages.len(), "chat streaming completion");

        let request = self
            .request(Method::POST, paths::CHAT)?
            .json(&ChatRequest::new(options, true));

        self.execute_streaming(request, cancel)
            .await
            .map_err(|e| log_failure("chat_stream", e))
    }
}
