//! Rust SDK for the OpenAI REST and Realtime APIs.
//!
//! The crate is organized by transport surface:
//! - `api`: typed resource wrappers (chat, embeddings, models, files, audio).
//! - `http`: shared request pipelines (buffered, SSE-streamed, binary).
//! - `realtime`: websocket session for the realtime API.
//! - `sse`: incremental server-sent-events decoder.
//! - `error`: error taxonomy and response classification.
//! - `retry`: bounded retry and backoff utilities.
//! - `config`: client options.

/// Typed resource wrappers over the core pipelines.
pub mod api;
/// Client options and defaults.
pub mod config;
/// Error taxonomy and API response classification.
pub mod error;
/// HTTP client and core request pipelines.
pub mod http;
/// Realtime websocket session and protocol events.
pub mod realtime;
/// Retry and backoff utilities used across the SDK.
pub mod retry;
/// Incremental server-sent-events decoder.
pub mod sse;

pub use config::{ClientOptions, DEFAULT_BASE_URL};
pub use error::{classify, ApiError, ApiErrorKind, Error, NetworkError};
pub use http::Client;
pub use realtime::{ClientEvent, RealtimeSession};
pub use retry::RetryPolicy;
pub use sse::{SseDecoder, SseEvent};
