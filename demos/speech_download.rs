use std::error::Error;
use std::fs::File;
use std::io::Write;

use openai_sdk::api::audio::SpeechRequest;
use openai_sdk::Client;
use secrecy::SecretString;

fn main() -> Result<(), Box<dyn Error>> {
    let api_key = std::env::var("OPENAI_API_KEY")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = Client::new(SecretString::new(api_key))?;
        let mut request = SpeechRequest::new("tts-1", "The quick brown fox.", "alloy");
        request.response_format = Some("mp3".to_string());

        let mut out = File::create("speech.mp3")?;
        let mut written = 0usize;
        client
            .create_speech(&request, |chunk| {
                written += chunk.len();
                let _ = out.write_all(&chunk);
            })
            .await?;

        println!("wrote speech.mp3 ({written} bytes)");
        Ok::<(), Box<dyn Error>>(())
    })
}
