//! Virtual clock and real-time sources.
//!
//! Script-visible time moves in whole seconds and only forward. The backend
//! loop compares it against observed real time and steps it one second at a
//! time, draining due tick events before every step, so a stalled loop catches
//! up without skipping any second.

use std::cell::Cell;
use std::rc::Rc;

/// Integer seconds of virtual time.
pub type VirtualTime = i64;

/// Monotonic virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClock {
    now: VirtualTime,
}

impl VirtualClock {
    /// Clock starting at `start`.
    pub const fn new(start: VirtualTime) -> Self {
        Self { now: start }
    }

    /// Current virtual time.
    pub const fn now(&self) -> VirtualTime {
        self.now
    }

    /// True while the clock lags `real`.
    pub const fn is_behind(&self, real: VirtualTime) -> bool {
        self.now < real
    }

    /// Step forward exactly one second.
    pub const fn tick(&mut self) {
        self.now += 1;
    }

    /// Jump forward to `time`. Earlier times are ignored; the clock never rewinds.
    pub fn sync_to(&mut self, time: VirtualTime) {
        self.now = self.now.max(time);
    }
}

/// Source of observed real time in whole seconds.
pub trait TimeSource {
    /// Current real time.
    fn now_secs(&self) -> VirtualTime;
}

/// Real time read from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_secs(&self) -> VirtualTime {
        crate::util::clock::now_secs()
    }
}

/// Hand-driven time source for simulations and tests.
///
/// Clones share the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<VirtualTime>>,
}

impl ManualTimeSource {
    /// Source reading `start`.
    pub fn new(start: VirtualTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Set the reported time.
    pub fn set(&self, time: VirtualTime) {
        self.now.set(time);
    }

    /// Move the reported time forward.
    pub fn advance(&self, secs: VirtualTime) {
        self.now.set(self.now.get() + secs);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_secs(&self) -> VirtualTime {
        self.now.get()
    }
}
