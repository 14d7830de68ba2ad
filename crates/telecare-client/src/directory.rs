//! Room directory: bucketing and selection.
//!
//! Rooms are partitioned locally from the flat listing so the three
//! buckets can never drift: no `expired_at` means the doctor has not
//! accepted yet (pending), an elapsed `expired_at` is expired, anything
//! else is on-going. The partition is disjoint and exhaustive.

use chrono::{DateTime, Utc};

use telecare_shared::countdown;
use telecare_shared::model::RoomPreview;

#[derive(Debug, Default)]
pub struct RoomBuckets {
    pub pending: Vec<RoomPreview>,
    pub on_going: Vec<RoomPreview>,
    pub expired: Vec<RoomPreview>,
}

pub fn partition(rooms: Vec<RoomPreview>, now: DateTime<Utc>) -> RoomBuckets {
    let mut buckets = RoomBuckets::default();

    for room in rooms {
        match room.expired_at {
            None => buckets.pending.push(room),
            Some(at) if countdown::is_expired(Some(at), now) => buckets.expired.push(room),
            Some(_) => buckets.on_going.push(room),
        }
    }

    buckets
}

/// Outcome of a selection attempt.
#[derive(Debug)]
pub enum Selection {
    /// A different room was picked; the caller tears down the old session
    /// and opens a new one bound to this room.
    Changed(RoomPreview),
    /// The room was already selected. No token request, no connection.
    Unchanged,
}

/// Tracks which room is currently open. Re-selecting it is a no-op.
#[derive(Debug, Default)]
pub struct Directory {
    selected: Option<i64>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn select(&mut self, room: RoomPreview) -> Selection {
        if self.selected == Some(room.id) {
            return Selection::Unchanged;
        }
        self.selected = Some(room.id);
        Selection::Changed(room)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}
