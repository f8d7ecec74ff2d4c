use std::error::Error;
use std::io::Write;

use openai_sdk::api::chat::{ChatCompletionRequest, ChatMessage};
use openai_sdk::Client;
use secrecy::SecretString;
use serde_json::Value;

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = std::env::var("OPENAI_API_KEY")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = Client::new(SecretString::new(api_key))?;
        let request = ChatCompletionRequest::new(
            "gpt-4o-mini",
            vec![
                ChatMessage::system("You are a concise assistant."),
                ChatMessage::user("Name three rivers in one line."),
            ],
        );

        client
            .create_chat_completion_stream(&request, |chunk| {
                let delta = chunk
                    .pointer("/choices/0/delta/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                print!("{delta}");
                let _ = std::io::stdout().flush();
            })
            .await?;
        println!();

        Ok::<(), Box<dyn Error>>(())
    })
}
