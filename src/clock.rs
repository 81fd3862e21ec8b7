//! Injectable time sources for the dispatch worker.
//!
//! The worker's notion of "now" lives behind the [`Clock`] trait so that
//! due-time behavior is deterministically testable: production code uses
//! [`SystemClock`], tests drive a [`VirtualClock`] by hand.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub use minstant::Instant;

/// A time source the dispatch worker can read and sleep against.
///
/// Only the worker thread reads the clock, so implementations need no
/// coordination beyond being movable into that thread.
pub trait Clock: Send + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread until `now()` reaches `deadline`.
    ///
    /// Returns immediately if the deadline has already passed.
    fn sleep_until(&self, deadline: Instant);
}

/// Wall-clock time.
///
/// `now` reads the monotonic clock via [`minstant`]; `sleep_until` suspends
/// the thread for the remaining duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Hand-driven clock for deterministic timing tests.
///
/// The clock is frozen at the instant of construction and only moves when
/// [`advance`](VirtualClock::advance) is called. Sleepers block on a
/// condition variable and re-check the deadline after every advance, so a
/// test can hold a worker in its sleep for exactly as long as it wants.
///
/// Handles are cheap to clone and share one timeline.
#[derive(Clone)]
pub struct VirtualClock {
    shared: Arc<VirtualShared>,
}

struct VirtualShared {
    now: Mutex<Instant>,
    advanced: Condvar,
}

impl VirtualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(VirtualShared {
                now: Mutex::new(Instant::now()),
                advanced: Condvar::new(),
            }),
        }
    }

    /// Moves the clock forward by `step` and wakes every sleeper.
    pub fn advance(&self, step: Duration) {
        let mut now = self.shared.now.lock();
        *now = *now + step;
        self.shared.advanced.notify_all();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        *self.shared.now.lock()
    }

    fn sleep_until(&self, deadline: Instant) {
        let mut now = self.shared.now.lock();
        while *now < deadline {
            self.shared.advanced.wait(&mut now);
        }
    }
}
