//! Realtime API modules.
//!
//! - `proto`: typed outbound client events for the realtime protocol.
//! - `session`: websocket session with a handler table and send queue.

/// Typed outbound realtime events.
pub mod proto;
/// Websocket session, event dispatch, and connection lifecycle.
pub mod session;

pub use proto::ClientEvent;
pub use session::RealtimeSession;
