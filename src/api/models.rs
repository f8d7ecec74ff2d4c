//! Model listing, retrieval, and deletion.

use serde_json::Value;

use crate::error::Error;
use crate::http::Client;

impl Client {
    /// Lists the models available to the account.
    pub async fn list_models(&self) -> Result<Value, Error> {
        self.index("/models", &[]).await
    }

    /// Retrieves one model by id.
    pub async fn retrieve_model(&self, id: &str) -> Result<Value, Error> {
        if id.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("id"));
        }
        self.get(&format!("/models/{id}")).await
    }

    /// Deletes a fine-tuned model owned by the account.
    pub async fn delete_model(&self, id: &str) -> Result<Value, Error> {
        if id.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("id"));
        }
        self.delete(&format!("/models/{id}")).await
    }
}
