//! # ollama-core - Typed client for the Ollama HTTP API
//!
//! An async client for a locally running Ollama server: chat and text
//! completion, embeddings, and model management.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Streaming responses decoded lazily from newline-delimited JSON
//! - Explicit stream lifecycle with cancellation and idempotent close
//! - One error type that tells transport, status and decoding failures apart
//! - Type-safe request/response models
//!
//! ## Architecture
//!
//! Every endpoint has a buffered form that waits for the whole reply, and
//! the long-running ones (`chat`, `generate`, `pull`, `push`, `create`) also
//! have a `*_stream` form returning a [`StreamingResponse`]. A streaming
//! call returns as soon as headers arrive; each line of the body is decoded
//! only when the next item is requested.
//!
//! ### Core Types
//!
//! - **[`OllamaClient`]**: base URL, HTTP client and dispatch
//! - **[`StreamingResponse<T>`]**: a live result stream that owns the body
//! - **[`ClientError`]**: every failure the client reports
//!
//! ## Example
//! ```no_run
//! use ollama_core::{ChatCompletionOptions, ChatMessage, OllamaClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OllamaClient::new("http://localhost:11434")?;
//!     let options = ChatCompletionOptions::new("llama3", ChatMessage::user("Hello!"));
//!
//!     let mut stream = client.chat_stream(&options, CancellationToken::new()).await?;
//!     while let Some(chunk) = stream.next().await {
//!         if let Some(message) = chunk?.message {
//!             print!("{}", message.content);
//!         }
//!     }
//!     stream.close();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod http;
pub mod model;
pub mod ndjson;
pub mod options;
pub mod stream;

// Re-exports for convenience
pub use api::models::LoadModelEndpoint;
pub use client::{ClientError, OllamaClient};
pub use model::{
    ChatCompletion, ChatMessage, ChatRole, CompletionMetrics, EmbeddingResponse, GenerateCompletion,
    ListModelResponse, LoadModelResponse, ModelDetails, ModelSummary, ProgressStatus, ShowModelResponse,
};
pub use options::{
    ChatCompletionOptions, ClientOptions, CreateModelOptions, EmbeddingOptions, GenerateCompletionOptions,
    KeepAlive, ParameterOptions, PullModelOptions, PushModelOptions,
};
pub use stream::{StreamState, StreamingResponse};
