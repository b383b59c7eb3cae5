//! Model management: list, show, copy, delete, pull, push, create, load.

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::paths;
use crate::client::{ensure_not_blank, log_failure, ClientError, OllamaClient};
use crate::model::{ListModelResponse, LoadModelResponse, ProgressStatus, ShowModelResponse};
use crate::options::{CreateModelOptions, KeepAlive, PullModelOptions, PushModelOptions};
use crate::stream::StreamingResponse;

#[derive(Debug, Serialize)]
pub struct ShowRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CopyRequest<'a> {
    pub source: &'a str,
    pub destination: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PullRequest<'a> {
    #[serde(flatten)]
    pub options: &'a PullModelOptions,
    pub stream: bool,
}

impl<'a> PullRequest<'a> {
    pub fn new(options: &'a PullModelOptions, stream: bool) -> Self {
        Self { options, stream }
    }
}

#[derive(Debug, Serialize)]
pub struct PushRequest<'a> {
    #[serde(flatten)]
    pub options: &'a PushModelOptions,
    pub stream: bool,
}

impl<'a> PushRequest<'a> {
    pub fn new(options: &'a PushModelOptions, stream: bool) -> Self {
        Self { options, stream }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateRequest<'a> {
    #[serde(flatten)]
    pub options: &'a CreateModelOptions,
    pub stream: bool,
}

impl<'a> CreateRequest<'a> {
    pub fn new(options: &'a CreateModelOptions, stream: bool) -> Self {
        Self { options, stream }
    }
}

/// Loading a model is a generate or chat call that carries only the model
/// name; the server loads it into memory and answers with an empty reply.
#[derive(Debug, Serialize)]
pub struct LoadRequest<'a> {
    pub model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<&'a KeepAlive>,
    pub stream: bool,
}

impl<'a> LoadRequest<'a> {
    pub fn new(model: &'a str, keep_alive: Option<&'a KeepAlive>) -> Self {
        Self {
            model,
            keep_alive,
            stream: false,
        }
    }
}

/// Which endpoint a model is loaded through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadModelEndpoint {
    Generate,
    Chat,
}

impl LoadModelEndpoint {
    fn path(self) -> &'static str {
        match self {
            LoadModelEndpoint::Generate => paths::GENERATE,
            LoadModelEndpoint::Chat => paths::CHAT,
        }
    }
}

impl OllamaClient {
    /// List models available locally.
    pub async fn list_models(&self) -> Result<ListModelResponse, ClientError> {
        debug!("list models");
        let request = self.request(Method::GET, paths::TAGS)?;
        self.execute_json(request, "ListModelResponse", |_| true)
            .await
            .map_err(|e| log_failure("list_models", e))
    }

    /// List models currently loaded into memory.
    pub async fn list_running_models(&self) -> Result<ListModelResponse, ClientError> {
        debug!("list running models");
        let request = self.request(Method::GET, paths::PS)?;
        self.execute_json(request, "ListModelResponse", |_| true)
            .await
            .map_err(|e| log_failure("list_running_models", e))
    }

    /// Show a model's Modelfile, template, parameters and details.
    pub async fn show_model(&self, name: &str) -> Result<ShowModelResponse, ClientError> {
        ensure_not_blank(name, "name")?;
        debug!(name, "show model");

        let request = self
            .request(Method::POST, paths::SHOW)?
            .json(&ShowRequest { name });
        self.execute_json(request, "ShowModelResponse", |_| true)
            .await
            .map_err(|e| log_failure("show_model", e))
    }

    /// Copy a model under a new name.
    pub async fn copy_model(&self, source: &str, destination: &str) -> Result<(), ClientError> {
        ensure_not_blank(source, "source")?;
        ensure_not_blank(destination, "destination")?;
        debug!(source, destination, "copy model");

        let request = self
            .request(Method::POST, paths::COPY)?
            .json(&CopyRequest { source, destination });
        self.execute(request)
            .await
            .map(drop)
            .map_err(|e| log_failure("copy_model", e))
    }

    /// Delete a model and its data.
    pub async fn delete_model(&self, name: &str) -> Result<(), ClientError> {
        ensure_not_blank(name, "name")?;
        debug!(name, "delete model");

        let request = self
            .request(Method::DELETE, paths::DELETE)?
            .json(&DeleteRequest { name });
        self.execute(request)
            .await
            .map(drop)
            .map_err(|e| log_failure("delete_model", e))
    }

    /// Download a model from the library and wait for it to finish.
    pub async fn pull_model(&self, options: &PullModelOptions) -> Result<ProgressStatus, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "pull model");

        let request = self
            .request(Method::POST, paths::PULL)?
            .json(&PullRequest::new(options, false));
        self.execute_json(request, "ProgressStatus", |_| true)
            .await
            .map_err(|e| log_failure("pull_model", e))
    }

    /// Download a model from the library, streaming progress records.
    pub async fn pull_model_stream(
        &self,
        options: &PullModelOptions,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<ProgressStatus>, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "pull model streaming");

        let request = self
            .request(Method::POST, paths::PULL)?
            .json(&PullRequest::new(options, true));
        self.execute_streaming(request, cancel)
            .await
            .map_err(|e| log_failure("pull_model_stream", e))
    }

    /// Upload a model to a registry and wait for it to finish.
    pub async fn push_model(&self, options: &PushModelOptions) -> Result<ProgressStatus, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "push model");

        let request = self
            .request(Method::POST, paths::PUSH)?
            .json(&PushRequest::new(options, false));
        self.execute_json(request, "ProgressStatus", |_| true)
            .await
            .map_err(|e| log_failure("push_model", e))
    }

    /// Upload a model to a registry, streaming progress records.
    pub async fn push_model_stream(
        &self,
        options: &PushModelOptions,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<ProgressStatus>, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "push model streaming");

        let request = self
            .request(Method::POST, paths::PUSH)?
            .json(&PushRequest::new(options, true));
        self.execute_streaming(request, cancel)
            .await
            .map_err(|e| log_failure("push_model_stream", e))
    }

    /// Create a model from a Modelfile and wait for it to finish.
    ///
    /// A response without a status is rejected as a deserialization failure.
    pub async fn create_model(&self, options: &CreateModelOptions) -> Result<ProgressStatus, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "create model");

        let request = self
            .request(Method::POST, paths::CREATE)?
            .json(&CreateRequest::new(options, false));
        self.execute_json(request, "ProgressStatus", |s: &ProgressStatus| {
            !s.status.trim().is_empty()
        })
        .await
        .map_err(|e| log_failure("create_model", e))
    }

    /// Create a model from a Modelfile, streaming progress records.
    pub async fn create_model_stream(
        &self,
        options: &CreateModelOptions,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse<ProgressStatus>, ClientError> {
        ensure_not_blank(&options.name, "name")?;
        debug!(name = %options.name, "create model streaming");

        let request = self
            .request(Method::POST, paths::CREATE)?
            .json(&CreateRequest::new(options, true));
        self.execute_streaming(request, cancel)
            .await
            .map_err(|e| log_failure("create_model_stream", e))
    }

    /// Load a model into memory without generating anything.
    pub async fn load_model(
        &self,
        model: &str,
        endpoint: LoadModelEndpoint,
        keep_alive: Option<&KeepAlive>,
    ) -> Result<LoadModelResponse, ClientError> {
        ensure_not_blank(model, "model")?;
        debug!(model, ?endpoint, "load model");

        let request = self
            .request(Method::POST, endpoint.path())?
            .json(&LoadRequest::new(model, keep_alive));
        self.execute_json(request, "LoadModelResponse", |r: &LoadModelResponse| {
            !r.model.trim().is_empty()
        })
        .await
        .map_err(|e| log_failure("load_model", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pull_request_wire_shape() {
        let options = PullModelOptions::new("llama3").with_insecure(true);
        assert_eq!(
            serde_json::to_value(PullRequest::new(&options, true)).unwrap(),
            json!({ "name": "llama3", "insecure": true, "stream": true })
        );

        let plain = PullModelOptions::new("llama3");
        assert_eq!(
            serde_json::to_value(PullRequest::new(&plain, false)).unwrap(),
            json!({ "name": "llama3", "stream": false })
        );
    }

    #[test]
    fn test_create_request_wire_shape() {
        let options = CreateModelOptions::from_path("mario", "/srv/Modelfile");
        assert_eq!(
            serde_json::to_value(CreateRequest::new(&options, true)).unwrap(),
            json!({ "name": "mario", "path": "/srv/Modelfile", "stream": true })
        );
    }

    #[test]
    fn test_load_request_wire_shape() {
        let forever = KeepAlive::Seconds(-1);
        assert_eq!(
            serde_json::to_value(LoadRequest::new("llama3", Some(&forever))).unwrap(),
            json!({ "model": "llama3", "keep_alive": -1, "stream": false })
        );
        assert_eq!(LoadModelEndpoint::Chat.path(), "api/chat");
        assert_eq!(LoadModelEndpoint::Generate.path(), "api/generate");
    }

    #[test]
    fn test_copy_request_wire_shape() {
        let request = CopyRequest {
            source: "llama3",
            destination: "llama3-backup",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "source": "llama3", "destination": "llama3-backup" })
        );
    }
}
