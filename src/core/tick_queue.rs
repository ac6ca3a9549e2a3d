//! One-shot callbacks keyed by virtual time.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::core::clock::VirtualTime;
use crate::core::driver::Driver;
use crate::core::error::ScriptResult;
use crate::core::host::ScriptHost;

/// Zero-argument procedure run when a tick event fires.
///
/// It receives the driver and host so it can reschedule itself, touch the
/// heartbeat list or call into scripts.
pub type TickCallback = Box<dyn FnOnce(&mut Driver, &mut dyn ScriptHost) -> ScriptResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickState {
    Pending,
    Cancelled,
    Done,
}

/// Shared state of one event. Marks the event done when the queue lets go of
/// it, whether it fired or was dropped unfired.
#[derive(Debug)]
struct Completion(Rc<Cell<TickState>>);

impl Drop for Completion {
    fn drop(&mut self) {
        if self.0.get() == TickState::Pending {
            self.0.set(TickState::Done);
        }
    }
}

/// A queued event.
pub struct TickEvent {
    label: &'static str,
    callback: TickCallback,
    state: Completion,
}

impl TickEvent {
    /// Name used in logs.
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// False once the event has been cancelled.
    pub fn is_valid(&self) -> bool {
        self.state.0.get() == TickState::Pending
    }

    /// Consume the event, yielding its callback. Handles stop reporting the
    /// event as pending from here on.
    pub fn into_callback(self) -> TickCallback {
        self.callback
    }
}

impl fmt::Debug for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickEvent")
            .field("label", &self.label)
            .field("state", &self.state.0.get())
            .finish_non_exhaustive()
    }
}

/// Caller-side handle for cancelling a scheduled event.
#[derive(Debug, Clone)]
pub struct TickHandle {
    due: VirtualTime,
    state: Rc<Cell<TickState>>,
}

impl TickHandle {
    /// Virtual time the event is due.
    pub const fn due(&self) -> VirtualTime {
        self.due
    }

    /// True while the event is still queued (or in the batch being drained)
    /// and has not been cancelled.
    pub fn is_pending(&self) -> bool {
        self.state.get() == TickState::Pending
    }
}

/// Ordered multimap of events.
///
/// Keys pair the due time with an insertion sequence, so events with the same
/// due time come out in insertion order.
#[derive(Debug, Default)]
pub struct TickEventQueue {
    events: BTreeMap<(VirtualTime, u64), TickEvent>,
    next_seq: u64,
}

impl TickEventQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `callback` to fire at `now + delay_secs`.
    pub fn schedule(
        &mut self,
        now: VirtualTime,
        delay_secs: u64,
        label: &'static str,
        callback: TickCallback,
    ) -> TickHandle {
        let due = now.saturating_add(i64::try_from(delay_secs).unwrap_or(i64::MAX));
        let state = Rc::new(Cell::new(TickState::Pending));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.insert(
            (due, seq),
            TickEvent {
                label,
                callback,
                state: Completion(Rc::clone(&state)),
            },
        );
        TickHandle { due, state }
    }

    /// Mark the event invalid. It stays in the map until the drain that would
    /// have fired it. Returns whether the event was still pending.
    pub fn cancel(handle: &TickHandle) -> bool {
        let was_pending = handle.is_pending();
        if was_pending {
            handle.state.set(TickState::Cancelled);
        }
        was_pending
    }

    /// Remove and return every event due at or before `now`, in firing order.
    pub fn drain_due(&mut self, now: VirtualTime) -> Vec<TickEvent> {
        match self.events.first_key_value() {
            Some((&(due, _), _)) if due <= now => {}
            _ => return Vec::new(),
        }
        let later = self.events.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.events, later);
        due.into_values().collect()
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of queued events, cancelled ones included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Earliest due time.
    pub fn next_due(&self) -> Option<VirtualTime> {
        self.events.first_key_value().map(|(&(due, _), _)| due)
    }
}
