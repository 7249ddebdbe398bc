//! Time sources for the tick loop.
//!
//! The server never advances time on its own; it snapshots whatever clock
//! it was handed once per tick. Production uses [`SystemClock`], drivers
//! and tests that need determinism use [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A monotonically non-decreasing time source, read once per tick.
pub trait Clock {
    /// Current reading in seconds.
    fn now(&self) -> f64;
}

/// Wall-clock time measured from construction.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// An externally driven clock. Cloned handles share the same reading, so a
/// driver can keep one handle and give the other to the server.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}
