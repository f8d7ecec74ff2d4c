//! Embedding vectors.

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::http::Client;

/// Parameters for an embeddings request.
#[derive(Clone, Debug, Serialize)]
pub struct EmbeddingsRequest {
    /// Embedding model identifier (e.g. `text-embedding-3-small`).
    pub model: String,
    /// A string or an array of strings to embed.
    pub input: Value,
    /// Optional output dimension reduction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    /// End-user identifier for abuse tracking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl EmbeddingsRequest {
    /// Builds a request embedding a single string.
    pub fn single(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: Value::String(input.into()),
            dimensions: None,
            user: None,
        }
    }
}

impl Client {
    /// Creates embedding vectors for the given input.
    pub async fn create_embeddings(&self, request: &EmbeddingsRequest) -> Result<Value, Error> {
        if request.model.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("model"));
        }
        if request.input.is_null() {
            return Err(Error::MissingRequiredParameter("input"));
        }
        self.create_json("/embeddings", request).await
    }
}
