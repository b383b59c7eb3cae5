//! Streaming chat against a local Ollama server.
//!
//! Run with:
//! ```bash
//! export OLLAMA_HOST="127.0.0.1:11434"   # optional
//! cargo run --example chat_streaming
//! ```
//!
//! Press Ctrl-C to cancel the stream mid-answer.

use std::io::Write;

use ollama_core::{ChatCompletionOptions, ChatMessage, OllamaClient, ParameterOptions, StreamState};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = OllamaClient::from_env()?;

    let mut options = ChatCompletionOptions::new("llama3", ChatMessage::system("Answer in one short paragraph."))
        .with_options(ParameterOptions::default().with_temperature(0.7));
    options.push_message(ChatMessage::user("Write a haiku about Rust programming."));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    println!("Streaming response from {}...\n", client.base_url());

    let mut stream = client.chat_stream(&options, cancel).await?;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                if let Some(message) = &chunk.message {
                    print!("{}", message.content);
                    std::io::stdout().flush()?;
                }
                if chunk.done {
                    println!("\n\n=== Stream Complete ===");
                    if let Some(reason) = &chunk.metrics.done_reason {
                        println!("Done reason: {reason}");
                    }
                    if let Some(rate) = chunk.metrics.tokens_per_second() {
                        println!("Tokens per second: {rate:.1}");
                    }
                }
            }
            Err(e) if e.is_cancelled() => {
                println!("\n\nCancelled.");
            }
            Err(e) => {
                eprintln!("\nError in stream: {e}");
                return Err(e.into());
            }
        }
    }

    if stream.state() == StreamState::Exhausted {
        println!("Server ended the stream.");
    }
    stream.close();
    Ok(())
}
