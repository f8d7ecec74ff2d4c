//! File upload, listing, and content download.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::error::Error;
use crate::http::Client;

impl Client {
    /// Lists uploaded files, optionally filtered by purpose.
    pub async fn list_files(&self, purpose: Option<&str>) -> Result<Value, Error> {
        let query: Vec<(&str, &str)> = purpose.map(|p| ("purpose", p)).into_iter().collect();
        self.index("/files", &query).await
    }

    /// Retrieves one file's metadata.
    pub async fn retrieve_file(&self, id: &str) -> Result<Value, Error> {
        if id.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("id"));
        }
        self.get(&format!("/files/{id}")).await
    }

    /// Deletes an uploaded file.
    pub async fn delete_file(&self, id: &str) -> Result<Value, Error> {
        if id.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("id"));
        }
        self.delete(&format!("/files/{id}")).await
    }

    /// Uploads a local file for the given purpose.
    ///
    /// The file is read and validated before any network call: it must be
    /// openable, and `.jsonl` files must parse line by line.
    pub async fn upload_file(&self, path: &Path, purpose: &str) -> Result<Value, Error> {
        if purpose.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("purpose"));
        }

        let bytes = std::fs::read(path).map_err(|source| Error::FileCannotBeOpened {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension() == Some(std::ffi::OsStr::new("jsonl")) {
            validate_jsonl(path, &bytes)?;
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let purpose = purpose.to_string();

        self.create_multipart("/files", move || {
            Form::new().text("purpose", purpose.clone()).part(
                "file",
                Part::bytes(bytes.clone()).file_name(file_name.clone()),
            )
        })
        .await
    }

    /// Streams a file's content to the sink callback.
    pub async fn file_content<F>(&self, id: &str, on_chunk: F) -> Result<(), Error>
    where
        F: FnMut(Bytes),
    {
        if id.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("id"));
        }
        self.get_streamed_download(&format!("/files/{id}/content"), on_chunk)
            .await
    }
}

fn validate_jsonl(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let text = String::from_utf8_lossy(bytes);
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        serde_json::from_str::<Value>(line).map_err(|source| Error::JsonlFileCannotBeParsed {
            path: path.display().to_string(),
            line: index + 1,
            source,
        })?;
    }
    Ok(())
}
