//! Typed resource wrappers over the core request pipelines.
//!
//! Each module validates its parameters locally, builds the endpoint
//! path, and delegates to one of the [`Client`](crate::Client) pipelines;
//! responses come back as parsed JSON trees.

/// Speech synthesis and transcription.
pub mod audio;
/// Chat completions, buffered and streamed.
pub mod chat;
/// Embedding vectors.
pub mod embeddings;
/// File upload, listing, and content download.
pub mod files;
/// Model listing, retrieval, and deletion.
pub mod models;
