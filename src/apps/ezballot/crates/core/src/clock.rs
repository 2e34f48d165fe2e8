//! Time sources.
//!
//! Timestamps are whole seconds. The registry never samples a clock itself;
//! callers pass the current time into each operation, and [`SharedRegistry`]
//! samples its [`Clock`] once per call.
//!
//! [`SharedRegistry`]: crate::SharedRegistry

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Seconds on the clock's timeline.
pub type Timestamp = u64;

pub const SECONDS_PER_MINUTE: u64 = 60;

/// A monotonic source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock seconds since the UNIX epoch, sampled once at construction and
/// advanced by a monotonic [`Instant`] afterwards so readings never go back.
#[derive(Clone, Debug)]
pub struct SystemClock {
    anchor: Timestamp,
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let anchor = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            anchor,
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        self.anchor.saturating_add(self.origin.elapsed().as_secs())
    }
}

/// A clock that only moves when told to. Used by tests and scripted replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock to `to`. Earlier times are ignored, keeping it monotonic.
    pub fn set(&self, to: Timestamp) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(secs))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
