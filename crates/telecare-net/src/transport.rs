//! Trait seams between the connection manager and its collaborators.
//!
//! The manager only ever talks to a [`TokenBroker`] and a
//! [`ChannelTransport`]; production wires in the REST client and the
//! WebSocket transport, tests substitute in-memory fakes.

use async_trait::async_trait;

use telecare_shared::model::{Chat, SessionToken};
use telecare_shared::wire::WsFrame;

use crate::error::NetError;

/// Exchanges a room hash for a fresh, short-lived token pair.
///
/// Every connection attempt — including every reconnect — must go through
/// this; stale pairs are never reused.
#[async_trait]
pub trait TokenBroker: Send + Sync {
    async fn issue_token(&self, room_hash: &str) -> Result<SessionToken, NetError>;
}

/// Opens one connection to the real-time channel endpoint.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, NetError>;
}

/// One live connection. Owned exclusively by the manager task; it is
/// dropped and recreated on reconnect, never mutated in place.
#[async_trait]
pub trait ChannelConnection: Send {
    /// Write one frame to the channel.
    async fn send(&mut self, frame: &WsFrame) -> Result<(), NetError>;

    /// Next inbound message. `None` means the server closed the
    /// connection; `Some(Err(_))` is a transport or decode error. Both
    /// put the manager on the reconnect path.
    async fn next(&mut self) -> Option<Result<Chat, NetError>>;

    /// Close the connection. Best effort; errors are ignored because the
    /// socket may already be gone.
    async fn close(&mut self);
}
