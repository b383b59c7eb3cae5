//! Pull a model and report download progress.
//!
//! Run with:
//! ```bash
//! cargo run --example pull_model -- llama3
//! ```

use ollama_core::{OllamaClient, PullModelOptions};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "llama3".to_string());
    let client = OllamaClient::from_env()?;

    let mut stream = client
        .pull_model_stream(&PullModelOptions::new(&name), CancellationToken::new())
        .await?;

    let mut last_status = String::new();
    while let Some(record) = stream.next().await {
        let record = record?;
        match record.fraction() {
            Some(fraction) => println!("{} {:>5.1}%", record.status, fraction * 100.0),
            None if record.status != last_status => println!("{}", record.status),
            None => {}
        }
        last_status = record.status;
    }
    stream.close();

    if last_status == "success" {
        println!("Pulled {name}");
        let names: Vec<String> = client.list_models().await?.names().map(str::to_string).collect();
        println!("Local models: {}", names.join(", "));
    }
    Ok(())
}
