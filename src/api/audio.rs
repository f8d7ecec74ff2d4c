//! Speech synthesis and transcription.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::http::Client;

/// Parameters for text-to-speech synthesis.
#[derive(Clone, Debug, Serialize)]
pub struct SpeechRequest {
    /// Speech model identifier (e.g. `tts-1`).
    pub model: String,
    /// Text to synthesize.
    pub input: String,
    /// Voice name (e.g. `alloy`).
    pub voice: String,
    /// Output container (`mp3`, `wav`, `flac`); server default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    /// Playback speed multiplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl SpeechRequest {
    /// Builds a request with the server-default format and speed.
    pub fn new(
        model: impl Into<String>,
        input: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            voice: voice.into(),
            response_format: None,
            speed: None,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.model.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("model"));
        }
        if self.input.is_empty() {
            return Err(Error::MissingRequiredParameter("input"));
        }
        if self.voice.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("voice"));
        }
        Ok(())
    }
}

impl Client {
    /// Synthesizes speech, streaming the audio bytes to the sink callback.
    pub async fn create_speech<F>(&self, request: &SpeechRequest, on_chunk: F) -> Result<(), Error>
    where
        F: FnMut(Bytes),
    {
        request.validate()?;
        self.create_json_streamed_download("/audio/speech", request, on_chunk)
            .await
    }

    /// Transcribes a local audio file.
    pub async fn transcribe_audio(&self, path: &Path, model: &str) -> Result<Value, Error> {
        if model.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("model"));
        }

        let bytes = std::fs::read(path).map_err(|source| Error::FileCannotBeOpened {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let model = model.to_string();

        self.create_multipart("/audio/transcriptions", move || {
            Form::new().text("model", model.clone()).part(
                "file",
                Part::bytes(bytes.clone()).file_name(file_name.clone()),
            )
        })
        .await
    }
}
