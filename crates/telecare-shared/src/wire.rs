//! Wire protocol frames exchanged over the real-time channel.
//!
//! Outbound frames are JSON objects tagged `{"type": ..., "data": ...}`.
//! Inbound frames are bare [`Chat`] objects pushed by the server whenever
//! any participant of the channel sends — including this client's own
//! messages, which come back through the channel rather than through the
//! send call.

use serde::{Deserialize, Serialize};

use crate::model::{Attachment, Chat, PrescriptionDrug, Side};

/// All frames a client sends over the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WsFrame {
    /// Authenticates the connection. Sent exactly once, immediately after
    /// the transport reports open, carrying the fresh token pair.
    Auth(AuthData),

    /// A chat message published to the channel.
    Chat(ChatData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    pub channel: String,
    pub client_token: String,
    pub channel_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatData {
    pub channel: String,
    pub side: Side,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub prescription_drugs: Vec<PrescriptionDrug>,
}

impl WsFrame {
    /// Serialize to the JSON text the server expects.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode an inbound text frame into a [`Chat`].
pub fn decode_inbound(text: &str) -> Result<Chat, serde_json::Error> {
    serde_json::from_str(text)
}
