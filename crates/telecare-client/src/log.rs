//! Append-only message log for one room.
//!
//! Messages are kept strictly in arrival order — send-time for outbound
//! (as relayed back by the server), receive-time for inbound. No
//! timestamp sort is ever applied; the transport delivers in the order
//! the server emits.

use telecare_shared::model::Chat;

/// How the host should bring the newest message into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    /// First population after a room switch: jump without animation.
    Instant,
    /// Subsequent appends: animate.
    Smooth,
}

#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<Chat>,
    first_render: bool,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            first_render: true,
        }
    }

    /// Append one message and report the scroll behavior for it.
    pub fn append(&mut self, chat: Chat) -> Scroll {
        self.entries.push(chat);
        if self.first_render {
            self.first_render = false;
            Scroll::Instant
        } else {
            Scroll::Smooth
        }
    }

    /// Seed the log with a room's history in one go. Counts as the first
    /// render.
    pub fn seed(&mut self, chats: Vec<Chat>) -> Scroll {
        self.entries.extend(chats);
        self.first_render = false;
        Scroll::Instant
    }

    /// Forget everything for a room switch; the next append jumps
    /// instantly again.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.first_render = true;
    }

    pub fn entries(&self) -> &[Chat] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
