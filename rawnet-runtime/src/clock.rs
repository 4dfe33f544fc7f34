use crossbeam::atomic::AtomicCell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of timestamps, measured from an arbitrary epoch that stays fixed for the life of
/// the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock time since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicCell<Duration>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        ManualClock {
            now: AtomicCell::new(start),
        }
    }

    pub fn set(&self, now: Duration) {
        self.now.store(now);
    }

    pub fn advance(&self, by: Duration) {
        // Only tests drive this clock, from one thread at a time
        self.now.store(self.now.load() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.load()
    }
}
