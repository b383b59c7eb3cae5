//! Ollama REST endpoints.
//!
//! Each submodule holds the wire-request types of one endpoint family, the
//! conversion from the caller-facing [`options`](crate::options) object to
//! that wire request, and the `OllamaClient` methods that dispatch it.

pub mod blobs;
pub mod chat;
pub mod embeddings;
pub mod generate;
pub mod models;

/// Endpoint paths, relative to the client base URL.
pub mod paths {
    pub const CHAT: &str = "api/chat";
    pub const GENERATE: &str = "api/generate";
    pub const EMBEDDINGS: &str = "api/embeddings";
    pub const TAGS: &str = "api/tags";
    pub const PS: &str = "api/ps";
    pub const SHOW: &str = "api/show";
    pub const COPY: &str = "api/copy";
    pub const DELETE: &str = "api/delete";
    pub const PULL: &str = "api/pull";
    pub const PUSH: &str = "api/push";
    pub const CREATE: &str = "api/create";

    /// Path of the blob with the given digest.
    pub fn blob(digest: &str) -> String {
        format!("api/blobs/{digest}")
    }
}
