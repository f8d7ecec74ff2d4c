use std::error::Error;
use std::sync::mpsc;

use openai_sdk::{Client, ClientEvent};
use secrecy::SecretString;
use serde_json::{json, Value};

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = std::env::var("OPENAI_API_KEY")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = Client::new(SecretString::new(api_key))?;
        let mut session = client.realtime_session("gpt-4o-realtime-preview")?;

        let (finished_tx, finished_rx) = mpsc::channel();

        session.on("session.created", |payload| {
            let id = payload
                .pointer("/session/id")
                .and_then(Value::as_str)
                .unwrap_or("?");
            println!("session created: {id}");
        });
        session.on("response.text.delta", |payload| {
            let delta = payload
                .get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default();
            print!("{delta}");
        });
        session.on("response.done", move |_| {
            println!();
            let _ = finished_tx.send(());
        });
        session.on("error", |detail| {
            eprintln!("realtime error: {detail}");
        });

        session.connect().await?;

        session.send(&ClientEvent::SessionUpdate {
            session: json!({ "modalities": ["text"] }),
        })?;
        session.send(&ClientEvent::ConversationItemCreate {
            item: json!({
                "type": "message",
                "role": "user",
                "content": [{ "type": "input_text", "text": "Say hello in five words." }],
            }),
        })?;
        session.send(&ClientEvent::ResponseCreate { response: None })?;

        // Handlers run on the session worker; block until the response ends.
        tokio::task::spawn_blocking(move || finished_rx.recv()).await??;
        session.close();

        Ok::<(), Box<dyn Error>>(())
    })
}
