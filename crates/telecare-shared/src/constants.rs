//! Protocol-wide constants shared by the transport and the composer.

/// Attachment formats the backend accepts, matched against the exact
/// (case-sensitive) filename suffix.
pub const ALLOWED_ATTACHMENT_FORMATS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

/// Maximum attachment size in bytes (2 MB as enforced by the media endpoint).
pub const MAX_ATTACHMENT_BYTES: usize = 2_000_000;

/// Path of the real-time chat endpoint, relative to the WS base URL.
pub const WS_CHAT_PATH: &str = "/chat-room";
