//! Session expiry clock.
//!
//! Converts the server-issued `expired_at` into a 1-second countdown and
//! a latched `expired` flag. Expiry is terminal: the clock flips the
//! shared session-active flag, which stops the connection manager's
//! reconnect cycle and disables the composer. The countdown itself is a
//! client-side estimate; the server stays the authority on whether sends
//! are actually accepted at the boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use telecare_shared::countdown;

/// What the clock currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryStatus {
    /// `MM:SS`, pinned to `"00:00"` once expired.
    pub remaining: String,
    pub expired: bool,
}

/// Pure tick logic, kept separate from the timer so it can be driven with
/// explicit clocks in tests.
#[derive(Debug)]
pub struct ExpiryLatch {
    expired_at: DateTime<Utc>,
    expired: bool,
}

impl ExpiryLatch {
    pub fn new(expired_at: DateTime<Utc>) -> Self {
        Self {
            expired_at,
            expired: false,
        }
    }

    /// Observe the clock at `now`. The expired flag flips on the same
    /// tick the remaining time reaches zero, and never flips back.
    pub fn tick(&mut self, now: DateTime<Utc>) -> ExpiryStatus {
        if !self.expired && countdown::is_expired(Some(self.expired_at), now) {
            self.expired = true;
        }

        let remaining = if self.expired {
            "00:00".to_string()
        } else {
            countdown::format_remaining(countdown::remaining(self.expired_at, now))
        };

        ExpiryStatus {
            remaining,
            expired: self.expired,
        }
    }

    /// Replace the deadline. Expiry is monotonic: a latched flag survives
    /// any later deadline.
    pub fn set_expired_at(&mut self, expired_at: DateTime<Utc>) {
        self.expired_at = expired_at;
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

/// The running clock task for one session.
pub struct ExpiryClock {
    status_rx: watch::Receiver<ExpiryStatus>,
    task: JoinHandle<()>,
}

impl ExpiryClock {
    /// Start ticking toward `expired_at`. Never call this for a pending
    /// room (no deadline yet); the session simply has no clock then.
    ///
    /// On expiry the clock flips `session_active` to false and stops.
    /// If the deadline has already elapsed, that happens immediately and
    /// no interval is started.
    pub fn start(expired_at: DateTime<Utc>, session_active: Arc<watch::Sender<bool>>) -> Self {
        let mut latch = ExpiryLatch::new(expired_at);
        let (status_tx, status_rx) = watch::channel(latch.tick(Utc::now()));

        let task = tokio::spawn(async move {
            if status_tx.borrow().expired {
                info!("Session already expired at clock start");
                let _ = session_active.send(false);
                return;
            }

            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick completes immediately

            loop {
                interval.tick().await;
                let status = latch.tick(Utc::now());
                let expired = status.expired;
                let _ = status_tx.send(status);

                if expired {
                    info!("Session expired, tearing down");
                    let _ = session_active.send(false);
                    break;
                }
            }
        });

        Self { status_rx, task }
    }

    pub fn status(&self) -> ExpiryStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExpiryStatus> {
        self.status_rx.clone()
    }

    /// Cancel the clock. Teardown is first-class, not an unmount side
    /// effect.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ExpiryClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}
