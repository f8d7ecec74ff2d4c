//! HTTP client and core request pipelines.
//!
//! Every resource call funnels through one of the entry points here:
//! buffered JSON requests, multipart uploads, SSE-streamed requests, and
//! raw binary downloads. Each path classifies non-success statuses through
//! [`error::classify`](crate::error::classify) and runs under the
//! configured retry policy.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::Form;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientOptions;
use crate::error::{classify, classify_stream_error, Error, NetworkError};
use crate::retry::retry_async;
use crate::sse::SseDecoder;

/// End-of-stream sentinel payload; filtered, never forwarded.
const DONE_SENTINEL: &str = "[DONE]";

/// Client for the REST surface.
///
/// Cheap to clone; resource helpers live in [`crate::api`] and realtime
/// session construction in [`crate::realtime`].
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: SecretString,
    options: ClientOptions,
}

impl Client {
    /// Creates a client with default options.
    pub fn new(api_key: SecretString) -> Result<Self, Error> {
        Self::with_options(api_key, ClientOptions::default())
    }

    /// Creates a client with explicit options.
    pub fn with_options(api_key: SecretString, options: ClientOptions) -> Result<Self, Error> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Configuration(
                "api key must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(NetworkError::Transport)?;

        Ok(Self {
            http,
            api_key,
            options,
        })
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Lists a collection resource.
    pub(crate) async fn index(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, Error> {
        retry_async(
            &self.options.retry,
            |_| {
                let request = self.request(Method::GET, path).query(query);
                async move { self.send_buffered(request).await }
            },
            Error::is_retryable,
        )
        .await
    }

    /// Fetches a single resource.
    pub(crate) async fn get(&self, path: &str) -> Result<Value, Error> {
        retry_async(
            &self.options.retry,
            |_| {
                let request = self.request(Method::GET, path);
                async move { self.send_buffered(request).await }
            },
            Error::is_retryable,
        )
        .await
    }

    /// Deletes a resource.
    pub(crate) async fn delete(&self, path: &str) -> Result<Value, Error> {
        retry_async(
            &self.options.retry,
            |_| {
                let request = self.request(Method::DELETE, path);
                async move { self.send_buffered(request).await }
            },
            Error::is_retryable,
        )
        .await
    }

    /// Creates a resource from a JSON body.
    pub(crate) async fn create_json<B>(&self, path: &str, body: &B) -> Result<Value, Error>
    where
        B: Serialize + ?Sized,
    {
        retry_async(
            &self.options.retry,
            |_| {
                let request = self.request(Method::POST, path).json(body);
                async move { self.send_buffered(request).await }
            },
            Error::is_retryable,
        )
        .await
    }

    /// Creates a resource from a multipart form.
    ///
    /// Forms are not replayable, so the caller provides a builder invoked
    /// once per attempt.
    pub(crate) async fn create_multipart<F>(&self, path: &str, make_form: F) -> Result<Value, Error>
    where
        F: Fn() -> Form,
    {
        retry_async(
            &self.options.retry,
            |_| {
                let request = self.request(Method::POST, path).multipart(make_form());
                async move { self.send_buffered(request).await }
            },
            Error::is_retryable,
        )
        .await
    }

    /// Issues a streamed JSON POST and dispatches each decoded event.
    ///
    /// Records whose payload is the `[DONE]` sentinel are filtered.
    /// Records that fail to parse as JSON are skipped so one malformed
    /// chunk cannot abort the stream. A non-success status, or an
    /// `{"error": ...}` event arriving mid-stream, classifies and raises.
    ///
    /// The retry loop is inlined rather than routed through
    /// [`retry_async`] because the event callback must be re-borrowed
    /// across attempts.
    pub(crate) async fn create_json_streamed<B, F>(
        &self,
        path: &str,
        body: &B,
        mut on_event: F,
    ) -> Result<(), Error>
    where
        B: Serialize + ?Sized,
        F: FnMut(Value),
    {
        let mut attempts = 0;
        loop {
            match self.stream_events_once(path, body, &mut on_event).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    attempts += 1;
                    match self.options.retry.next_delay(attempts) {
                        Some(delay) if error.is_retryable() => {
                            debug!(
                                event = "retry_attempt_failed",
                                attempt = attempts,
                                max_attempts = self.options.retry.max_attempts,
                                delay_ms = delay.as_millis() as u64
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ => return Err(error),
                    }
                }
            }
        }
    }

    /// Streams a raw download via GET, handing each fragment to the sink.
    pub(crate) async fn get_streamed_download<F>(
        &self,
        path: &str,
        on_chunk: F,
    ) -> Result<(), Error>
    where
        F: FnMut(Bytes),
    {
        self.streamed_download(|| self.request(Method::GET, path), on_chunk)
            .await
    }

    /// Streams a raw download produced by a JSON POST (speech synthesis,
    /// rendered content).
    pub(crate) async fn create_json_streamed_download<B, F>(
        &self,
        path: &str,
        body: &B,
        on_chunk: F,
    ) -> Result<(), Error>
    where
        B: Serialize + ?Sized,
        F: FnMut(Bytes),
    {
        self.streamed_download(|| self.request(Method::POST, path).json(body), on_chunk)
            .await
    }

    async fn streamed_download<R, F>(&self, make_request: R, mut on_chunk: F) -> Result<(), Error>
    where
        R: Fn() -> reqwest::RequestBuilder,
        F: FnMut(Bytes),
    {
        let mut attempts = 0;
        loop {
            match self.stream_bytes_once(make_request(), &mut on_chunk).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    attempts += 1;
                    match self.options.retry.next_delay(attempts) {
                        Some(delay) if error.is_retryable() => {
                            debug!(
                                event = "retry_attempt_failed",
                                attempt = attempts,
                                max_attempts = self.options.retry.max_attempts,
                                delay_ms = delay.as_millis() as u64
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ => return Err(error),
                    }
                }
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}",
            self.options.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(self.api_key.expose_secret())
            .timeout(self.options.request_timeout);

        if let Some(organization) = &self.options.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        if let Some(project) = &self.options.project {
            builder = builder.header("OpenAI-Project", project);
        }
        builder
    }

    async fn send_buffered(&self, request: reqwest::RequestBuilder) -> Result<Value, Error> {
        let response = request
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;
        let status = response.status();
        let body = response.text().await.map_err(NetworkError::from_reqwest)?;

        if !status.is_success() {
            return Err(classify(status.as_u16(), &body).into());
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(Error::Json)
    }

    async fn stream_events_once<B, F>(
        &self,
        path: &str,
        body: &B,
        on_event: &mut F,
    ) -> Result<(), Error>
    where
        B: Serialize + ?Sized,
        F: FnMut(Value),
    {
        let request = self
            .request(Method::POST, path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body);
        let response = request
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.map_err(NetworkError::from_reqwest)?;
            return Err(classify(status.as_u16(), &body).into());
        }

        let mut decoder = SseDecoder::new();
        let mut fragments = response.bytes_stream();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(NetworkError::from_reqwest)?;
            for record in decoder.feed(&fragment) {
                let data = record.data.trim();
                if data == DONE_SENTINEL {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(data) else {
                    debug!(event = "stream_chunk_skipped", data = %data);
                    continue;
                };
                if let Some(error) = value.get("error") {
                    return Err(classify_stream_error(error).into());
                }
                on_event(value);
            }
        }
        Ok(())
    }

    async fn stream_bytes_once<F>(
        &self,
        request: reqwest::RequestBuilder,
        on_chunk: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(Bytes),
    {
        let response = request
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.map_err(NetworkError::from_reqwest)?;
            return Err(classify(status.as_u16(), &body).into());
        }

        let mut fragments = response.bytes_stream();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(NetworkError::from_reqwest)?;
            on_chunk(fragment);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.options.base_url)
            .finish_non_exhaustive()
    }
}
