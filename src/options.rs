//! Client configuration and caller-facing request options.
//!
//! Every endpoint takes a "plain" options object defined here. The wire
//! request actually posted (which adds protocol plumbing such as the
//! `stream` flag) is derived from it in the matching [`api`](crate::api)
//! module.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::time::Duration;

use crate::model::ChatMessage;

/// Default address of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Environment variable the Ollama tooling uses for the server address.
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

/// Connection configuration for an [`OllamaClient`](crate::OllamaClient).
///
/// # Example
/// ```rust
/// use ollama_core::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::default()
///     .with_base_url("http://gpu-box:11434")
///     .with_timeout(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server base URL
    pub base_url: String,

    /// Whole-exchange limit for buffered calls; header-wait limit for
    /// streaming calls
    pub timeout: Option<Duration>,

    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            connect_timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }
}

impl ClientOptions {
    /// Defaults, with the base URL taken from `OLLAMA_HOST` when set.
    pub fn from_env() -> Self {
        match std::env::var(OLLAMA_HOST_ENV) {
            Ok(host) if !host.trim().is_empty() => Self::default().with_base_url(&host_to_base_url(&host)),
            _ => Self::default(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }
}

/// `OLLAMA_HOST` may be a bare `host:port`; give it a scheme.
fn host_to_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// How long the server keeps a model loaded after a request.
///
/// Either a number of seconds (negative keeps it loaded indefinitely, `0`
/// unloads immediately) or a duration string such as `"10m"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeepAlive {
    Seconds(i64),
    Duration(String),
}

impl From<Duration> for KeepAlive {
    fn from(duration: Duration) -> Self {
        KeepAlive::Seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }
}

/// Model runtime and sampling parameters (the Modelfile `PARAMETER` set).
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOptions {
    pub numa: Option<bool>,
    pub num_ctx: Option<u32>,
    pub num_batch: Option<u32>,
    pub num_gpu: Option<i32>,
    pub main_gpu: Option<u32>,
    pub low_vram: Option<bool>,
    pub logits_all: Option<bool>,
    pub vocab_only: Option<bool>,
    pub use_mmap: Option<bool>,
    pub use_mlock: Option<bool>,
    pub embedding_only: Option<bool>,
    pub num_thread: Option<u32>,
    pub num_keep: Option<i32>,
    pub seed: Option<i64>,
    pub num_predict: Option<i32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub tfs_z: Option<f32>,
    pub typical_p: Option<f32>,
    pub repeat_last_n: Option<i32>,
    pub temperature: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub mirostat: Option<u8>,
    pub mirostat_tau: Option<f32>,
    pub mirostat_eta: Option<f32>,
    pub penalize_newline: Option<bool>,
    pub stop: Option<Vec<String>>,
}

impl ParameterOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    pub fn with_num_predict(mut self, num_predict: i32) -> Self {
        self.num_predict = Some(num_predict);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Options for `/api/chat`.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionOptions {
    /// Model name
    pub model: String,

    /// Conversation so far; never empty
    pub messages: NonEmpty<ChatMessage>,

    /// Response format; currently only `"json"` is accepted by the server
    pub format: Option<String>,

    pub options: Option<ParameterOptions>,

    pub keep_alive: Option<KeepAlive>,
}

impl ChatCompletionOptions {
    /// Start a conversation with its first message.
    pub fn new(model: &str, first: ChatMessage) -> Self {
        Self::with_history(model, NonEmpty::new(first))
    }

    /// Continue an existing conversation.
    pub fn with_history(model: &str, messages: NonEmpty<ChatMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            format: None,
            options: None,
            keep_alive: None,
        }
    }

    /// Append a message to the conversation.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_options(mut self, options: ParameterOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }
}

/// Options for `/api/generate`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateCompletionOptions {
    /// Model name
    pub model: String,

    /// Prompt to generate a response for
    pub prompt: String,

    /// Base64-encoded images for multimodal models
    pub images: Option<Vec<String>>,

    pub format: Option<String>,

    pub options: Option<ParameterOptions>,

    /// Overrides the Modelfile system prompt
    pub system: Option<String>,

    /// Overrides the Modelfile prompt template
    pub template: Option<String>,

    /// `context` returned by a previous generation, for short-term memory
    pub context: Option<Vec<i64>>,

    /// Send the prompt without applying any template
    pub raw: Option<bool>,

    pub keep_alive: Option<KeepAlive>,
}

impl GenerateCompletionOptions {
    pub fn new(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = Some(template.to_string());
        self
    }

    pub fn with_context(mut self, context: Vec<i64>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_options(mut self, options: ParameterOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }
}

/// Options for `/api/embeddings`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddingOptions {
    pub model: String,
    pub prompt: String,
    pub options: Option<ParameterOptions>,
    pub keep_alive: Option<KeepAlive>,
}

impl EmbeddingOptions {
    pub fn new(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            ..Default::default()
        }
    }
}

/// Options for `/api/pull`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct PullModelOptions {
    pub name: String,
    /// Allow insecure connections to the library; development only
    pub insecure: Option<bool>,
}

impl PullModelOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            insecure: None,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }
}

/// Options for `/api/push`. The name has the form `<namespace>/<model>:<tag>`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushModelOptions {
    pub name: String,
    pub insecure: Option<bool>,
}

impl PushModelOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            insecure: None,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }
}

/// Options for `/api/create`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateModelOptions {
    /// Name of the model to create
    pub name: String,

    /// Contents of the Modelfile
    pub modelfile: Option<String>,

    /// Path to a Modelfile on the server
    pub path: Option<String>,
}

impl CreateModelOptions {
    /// Create from Modelfile contents.
    pub fn from_modelfile(name: &str, modelfile: &str) -> Self {
        Self {
            name: name.to_string(),
            modelfile: Some(modelfile.to_string()),
            path: None,
        }
    }

    /// Create from a Modelfile already on the server.
    pub fn from_path(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            modelfile: None,
            path: Some(path.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_options_default() {
        let options = ClientOptions::default();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert!(options.timeout.is_none());
        assert!(options.extra_headers.is_none());
    }

    #[test]
    fn test_host_to_base_url() {
        assert_eq!(host_to_base_url("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(host_to_base_url("https://ollama.internal/"), "https://ollama.internal");
        assert_eq!(host_to_base_url(" http://gpu:11434 "), "http://gpu:11434");
    }

    #[test]
    fn test_parameter_options_skip_unset() {
        let options = ParameterOptions::default().with_temperature(0.5).with_num_ctx(4096);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "temperature": 0.5, "num_ctx": 4096 })
        );
    }

    #[test]
    fn test_keep_alive_forms() {
        assert_eq!(serde_json::to_value(KeepAlive::Seconds(-1)).unwrap(), json!(-1));
        assert_eq!(
            serde_json::to_value(KeepAlive::Duration("10m".to_string())).unwrap(),
            json!("10m")
        );
        assert_eq!(KeepAlive::from(Duration::from_secs(300)), KeepAlive::Seconds(300));
        // Saturates rather than wrapping into the negative "forever" range.
        assert_eq!(KeepAlive::from(Duration::from_secs(u64::MAX)), KeepAlive::Seconds(i64::MAX));
    }

    #[test]
    fn test_chat_options_history() {
        let mut options = ChatCompletionOptions::new("llama3", ChatMessage::system("Be brief."));
        options.push_message(ChatMessage::user("Hi"));
        assert_eq!(options.messages.len(), 2);
        assert_eq!(options.messages.last().content, "Hi");
    }

    #[test]
    fn test_create_model_options() {
        let options = CreateModelOptions::from_modelfile("mario", "FROM llama3\nSYSTEM You are Mario.");
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "name": "mario", "modelfile": "FROM llama3\nSYSTEM You are Mario." })
        );
    }
}
