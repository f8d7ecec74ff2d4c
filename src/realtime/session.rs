//! Realtime websocket session.
//!
//! A background worker owns the socket (reads, writes, ping/pong); the
//! session exposes a handler table keyed by event type plus an outbound
//! send queue. Handlers run on the worker task in frame order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::Error;
use crate::http::Client;
use crate::realtime::proto::ClientEvent;

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback invoked with a parsed inbound payload.
///
/// Lifecycle dispatches (`"open"`, `"close"`) pass `Value::Null`.
pub type EventHandler = Box<dyn FnMut(Value) + Send>;

/// Handler table and connection flag shared between the session handle
/// and the socket worker.
#[derive(Clone, Default)]
pub(crate) struct Dispatcher {
    handlers: Arc<Mutex<HashMap<String, EventHandler>>>,
    connected: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Registers a handler; the last registration for a key wins.
    fn register(&self, event_type: &str, handler: EventHandler) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.insert(event_type.to_string(), handler);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Invokes the handler registered for `event_type`, if any.
    ///
    /// The handler is taken out of the table for the duration of the call
    /// so it may itself register handlers; a replacement registered during
    /// the call wins over the reinsertion.
    fn dispatch(&self, event_type: &str, payload: Value) {
        let taken = self
            .handlers
            .lock()
            .ok()
            .and_then(|mut handlers| handlers.remove(event_type));
        let Some(mut handler) = taken else {
            return;
        };
        handler(payload);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.entry(event_type.to_string()).or_insert(handler);
        }
    }

    pub(crate) fn handle_open(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.dispatch("open", Value::Null);
    }

    /// Routes one inbound text frame.
    ///
    /// Valid JSON goes to the generic `"message"` handler and, when the
    /// payload carries a string `type` field, to that type's handler with
    /// the identical payload. Invalid JSON is wrapped as `{"raw": ...}`
    /// and only reaches `"message"`; it never raises.
    pub(crate) fn handle_text(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(payload) => {
                self.dispatch("message", payload.clone());
                if let Some(event_type) = payload.get("type").and_then(Value::as_str) {
                    let event_type = event_type.to_string();
                    self.dispatch(&event_type, payload);
                }
            }
            Err(_) => self.dispatch("message", json!({ "raw": text })),
        }
    }

    pub(crate) fn handle_error(&self, detail: &str) {
        self.dispatch("error", Value::String(detail.to_string()));
    }

    pub(crate) fn handle_close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.dispatch("close", Value::Null);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Bidirectional realtime session over one websocket connection.
///
/// Created by [`Client::realtime_session`], which performs no I/O; call
/// [`connect`](Self::connect) after registering handlers. Dropping the
/// session closes the socket on every exit path.
#[derive(Debug)]
pub struct RealtimeSession {
    endpoint: String,
    api_key: SecretString,
    organization: Option<String>,
    project: Option<String>,
    dispatcher: Dispatcher,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl Client {
    /// Prepares a realtime session for the given model.
    ///
    /// The websocket endpoint is derived from the configured base URL by
    /// swapping the scheme to its websocket counterpart.
    pub fn realtime_session(&self, model: &str) -> Result<RealtimeSession, Error> {
        if model.trim().is_empty() {
            return Err(Error::MissingRequiredParameter("model"));
        }
        let options = self.options();
        Ok(RealtimeSession {
            endpoint: realtime_endpoint(&options.base_url, model)?,
            api_key: self.api_key().clone(),
            organization: options.organization.clone(),
            project: options.project.clone(),
            dispatcher: Dispatcher::default(),
            outbound: None,
        })
    }
}

impl RealtimeSession {
    /// Registers a handler for an event type.
    ///
    /// Reserved keys: `"open"`, `"close"`, `"error"`, and the generic
    /// `"message"`; every other key matches the inbound payload's `type`
    /// field. Registering twice for one key replaces the earlier handler.
    pub fn on<F>(&self, event_type: &str, handler: F)
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.dispatcher.register(event_type, Box::new(handler));
    }

    /// Whether the underlying transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// Opens the websocket and starts the socket worker.
    ///
    /// On success the `"open"` handler fires before this returns.
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.outbound.is_some() {
            return Err(Error::Configuration(
                "realtime session is already connected".to_string(),
            ));
        }

        let mut request = self.endpoint.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret())
                .parse()
                .map_err(|_| Error::Configuration("api key is not a valid header".to_string()))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        if let Some(organization) = &self.organization {
            headers.insert(
                "OpenAI-Organization",
                organization.parse().map_err(|_| {
                    Error::Configuration("organization is not a valid header".to_string())
                })?,
            );
        }
        if let Some(project) = &self.project {
            headers.insert(
                "OpenAI-Project",
                project.parse().map_err(|_| {
                    Error::Configuration("project is not a valid header".to_string())
                })?,
            );
        }

        let (socket, _) = connect_async(request).await?;
        debug!(event = "realtime_connected", endpoint = %self.endpoint);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.dispatcher.handle_open();
        tokio::spawn(session_worker(socket, outbound_rx, self.dispatcher.clone()));
        self.outbound = Some(outbound_tx);
        Ok(())
    }

    /// Serializes an arbitrary payload and queues it for sending.
    ///
    /// The socket is assumed open; before [`connect`](Self::connect) or
    /// after [`close`](Self::close) this fails with
    /// [`Error::SendQueueClosed`].
    pub fn send_event(&self, event: &Value) -> Result<(), Error> {
        let text = serde_json::to_string(event)?;
        self.send_text(text)
    }

    /// Sends a typed client event.
    pub fn send(&self, event: &ClientEvent) -> Result<(), Error> {
        let text = event.to_text()?;
        self.send_text(text)
    }

    fn send_text(&self, text: String) -> Result<(), Error> {
        let Some(outbound) = &self.outbound else {
            return Err(Error::SendQueueClosed);
        };
        outbound
            .send(Message::Text(text))
            .map_err(|_| Error::SendQueueClosed)
    }

    /// Closes the underlying socket.
    ///
    /// The worker drains the queue, sends a close frame, and fires the
    /// `"close"` handler once the transport shuts down.
    pub fn close(&mut self) {
        self.outbound = None;
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the socket: writes queued outbound frames, answers pings, and
/// routes inbound frames through the dispatcher. Runs until either side
/// closes, then fires the `"close"` dispatch exactly once.
async fn session_worker(
    mut socket: WsSocket,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    dispatcher: Dispatcher,
) {
    loop {
        tokio::select! {
            maybe_outbound = outbound_rx.recv() => {
                match maybe_outbound {
                    Some(message) => {
                        if let Err(err) = socket.send(message).await {
                            dispatcher.handle_error(&err.to_string());
                            break;
                        }
                    }
                    None => {
                        let _ = socket.close(None).await;
                        break;
                    }
                }
            }
            maybe_inbound = socket.next() => {
                match maybe_inbound {
                    Some(Ok(Message::Text(text))) => dispatcher.handle_text(&text),
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        dispatcher.handle_error(&err.to_string());
                        break;
                    }
                }
            }
        }
    }

    dispatcher.handle_close();
}

fn realtime_endpoint(base_url: &str, model: &str) -> Result<String, Error> {
    let origin = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base_url.starts_with("wss://") || base_url.starts_with("ws://") {
        base_url.to_string()
    } else {
        return Err(Error::Configuration(format!(
            "base url {base_url:?} has no websocket counterpart"
        )));
    };
    Ok(format!(
        "{}/realtime?model={model}",
        origin.trim_end_matches('/')
    ))
}
