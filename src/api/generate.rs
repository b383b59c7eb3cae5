//! `/api/generate`: text completion, streaming and buffered.

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::paths;
use crate::client::{ensure_not_blank, log_failure, ClientError, OllamaClient};
use crate::model::GenerateCompletion;
use crate::options::GenerateCompletionOptions;
use crate::stream::StreamingResponse;

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    #[serde(flatten)]
    pub options: &'a GenerateCompletionOptions,
    pub stream: bool,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(options: &'a GenerateCompletionOptions, stream: bool) -> Self {
        Self { options, stream }
    }
}

fn validate(options: &GenerateCompletionOptions) -> Result<(), ClientError> {
    ensure_not_blank(&options.model, "model")?;
    ensure_not_blank(&options.prompt, "prompt")
}

impl OllamaClient {
    /// Generate a completion for a prompt and wait for all of it.
    pub async fn generate(&self, options: &GenerateCompletionOptions) -> Result<GenerateCompletion, ClientError> {
        validate(options)?;
        debug!(model = %options.model, "generate completion");

        let request = self
            .request(Method::POST, paths::GENERATE)?
            .json(&GenerateRequest::new(options, false));

        self.execute_json(request, "GenerateCompletion", |c: &GenerateCompletion| {
            !c.model.trim().is_empty()
        })
        .await
        .map_err(|e| log_failure("generate", e))
    }

    /// Generate a completion for a prompt, streamed token by token.
    pub async fn generate_stream(
        &self,
        options: &GenerateCompletionOptions,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<GenerateCompletion>, ClientError> {
        validate(options)?;
        debug!(model = %options.model, "generate completion streaming");

        let request = self
            .request(Method::POST, paths::GENERATE)?
            .json(&GenerateRequest::new(options, true));

        self.execute_streaming(request, cancel)
            .await
            .map_err(|e| log_failure("generate_stream", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_wire_shape() {
        let options = GenerateCompletionOptions::new("llama3", "Why is the sky blue?")
            .with_system("Answer in one sentence.")
            .with_context(vec![1, 2, 3])
            .with_raw(false);

        assert_eq!(
            serde_json::to_value(GenerateRequest::new(&options, false)).unwrap(),
            json!({
                "model": "llama3",
                "prompt": "Why is the sky blue?",
                "system": "Answer in one sentence.",
                "context": [1, 2, 3],
                "raw": false,
                "stream": false,
            })
        );
    }

    #[test]
    fn test_validate() {
        assert!(validate(&GenerateCompletionOptions::new("llama3", "Hi")).is_ok());
        assert!(matches!(
            validate(&GenerateCompletionOptions::new("", "Hi")),
            Err(ClientError::InvalidArgument(msg)) if msg.contains("model")
        ));
        assert!(matches!(
            validate(&GenerateCompletionOptions::new("llama3", "")),
            Err(ClientError::InvalidArgument(msg)) if msg.contains("prompt")
        ));
    }
}
