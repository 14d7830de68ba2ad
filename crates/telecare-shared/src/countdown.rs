//! Countdown math for the session expiry clock.
//!
//! All comparisons are done in UTC against a caller-supplied `now`, so the
//! functions stay pure and testable. The displayed countdown is a
//! client-side estimate; the server remains the authority on whether a
//! send is actually accepted near the boundary.

use chrono::{DateTime, Duration, Utc};

/// Whether the room has expired at `now`. A room with no `expired_at` has
/// not started yet and is never considered expired.
pub fn is_expired(expired_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expired_at {
        Some(at) => at <= now,
        None => false,
    }
}

/// Time left until `expired_at`, clamped to zero once elapsed.
pub fn remaining(expired_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let left = expired_at - now;
    if left < Duration::zero() {
        Duration::zero()
    } else {
        left
    }
}

/// Format a remaining duration as `MM:SS`.
///
/// Hours are folded into the minute field (90 minutes renders as
/// `"90:00"`), matching the backend's session-length conventions. Zero or
/// negative durations render as `"00:00"`.
pub fn format_remaining(left: Duration) -> String {
    let total_seconds = left.num_seconds().max(0);
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}
