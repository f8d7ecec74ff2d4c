//! Typed outbound events for the realtime protocol.
//!
//! The wire format is JSON text frames tagged by a `type` field. Inbound
//! frames are deliberately left untyped (the server event surface is wide
//! and fast-moving); handlers receive the raw parsed payload keyed by that
//! same `type` tag.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common client-to-server realtime events.
///
/// Anything not covered here can be sent as a raw payload through
/// [`RealtimeSession::send_event`](crate::realtime::RealtimeSession::send_event).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Updates session defaults (voice, modalities, instructions).
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Partial session object; unset fields keep their value.
        session: Value,
    },

    /// Asks the server to start generating a response.
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Optional per-response overrides.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },

    /// Appends base64-encoded audio to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio bytes.
        audio: String,
    },

    /// Commits the buffered input audio as a user message.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Adds an item (message, function call output) to the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Conversation item object.
        item: Value,
    },
}

impl ClientEvent {
    /// Builds an audio append event from raw bytes.
    pub fn append_audio(audio: &[u8]) -> Self {
        Self::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(audio),
        }
    }

    /// Serializes the event to its wire JSON.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
