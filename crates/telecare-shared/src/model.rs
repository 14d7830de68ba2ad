//! Data model for consultation chat rooms and their messages.
//!
//! Field names follow the backend's snake_case JSON exactly; these structs
//! are deserialized straight from REST responses and from inbound
//! real-time frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A room as it appears in the directory listing.
///
/// `expired_at` is absent while the room is pending acceptance; once set,
/// it is the absolute UTC instant the consultation ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPreview {
    pub id: i64,
    /// Opaque channel name. A capability: not derivable from `id`.
    pub hash: String,
    pub participant_name: String,
    pub participant_picture_url: String,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_chat: Option<Chat>,
}

/// Full room state fetched when a room is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetail {
    pub id: i64,
    pub room_hash: String,
    pub doctor_account_id: i64,
    pub user_account_id: i64,
    pub doctor_certificate_url: String,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chats: Vec<Chat>,
}

/// One message in a room. Immutable once created; the server assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub room_id: i64,
    pub sender_account_id: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Prescription>,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file reference embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub format: String,
}

/// A structured prescription attached to a message by a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    #[serde(default)]
    pub prescription_drugs: Vec<PrescriptionDrug>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionDrug {
    pub id: i64,
    pub drug: Drug,
    pub quantity: i32,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drug {
    pub id: i64,
    pub name: String,
    pub image: String,
}

/// The short-lived credential pair issued for one connection attempt.
///
/// Both tokens expire together; a reconnect must request a fresh pair
/// and never reuse a stale one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub channel: String,
    pub token: TokenPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub client_token: String,
    pub channel_token: String,
}

/// Which side of the consultation a frame originates from.
/// Serialized as the integer the backend expects: 1 = user, 2 = doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    User,
    Doctor,
}

impl Side {
    pub fn as_u8(self) -> u8 {
        match self {
            Side::User => 1,
            Side::Doctor => 2,
        }
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Side::User),
            2 => Ok(Side::Doctor),
            other => Err(serde::de::Error::custom(format!(
                "invalid side: {other}"
            ))),
        }
    }
}
