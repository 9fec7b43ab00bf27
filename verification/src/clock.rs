//! Wall clock that advances with the tokio timer.

use tokio::time::Instant;
use vouch_types::{Clock, Timestamp};

/// Wall-clock time measured as an anchor plus tokio-elapsed time.
///
/// Deriving `now` from `tokio::time::Instant` keeps countdowns and expiry
/// checks consistent with the timer driving them, including when the tokio
/// clock is paused.
pub struct SystemClock {
    base: Timestamp,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::starting_at(Timestamp::now())
    }

    /// A clock that reads `base` right now.
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            anchor: Instant::now(),
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
        self.base.plus_secs(self.anchor.elapsed().as_secs())
    }
}
