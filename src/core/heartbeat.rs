//! Round-robin heartbeat list.
//!
//! Entries live in a dense vector whose order is the firing order. A round
//! walks the live vector by index rather than a copy, so callbacks may add or
//! remove entries mid-round. Appends land past the round's snapshot and wait
//! for the next round. Removals shift later entries down, and [`HeartbeatList::remove`]
//! pulls the round cursor back in lockstep so no entry is skipped or revisited.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::object::ObjectId;

/// One registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatEntry {
    /// Non-owning reference to the object.
    pub object: ObjectId,
    /// Rounds left before the next call.
    pub ticks_remaining: i32,
    /// Rounds between calls.
    pub period: i32,
}

/// Snapshot of the heartbeat subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    /// Registered objects.
    pub objects: usize,
    /// Rounds started so far.
    pub rounds: u64,
    /// Percentage of the last round that completed.
    pub completed_pct: f64,
}

/// The heartbeat list plus the cursor of the round in progress.
#[derive(Debug)]
pub struct HeartbeatList {
    entries: Vec<HeartbeatEntry>,
    chunk: usize,
    /// Index of the next entry to visit in the active round.
    cursor: usize,
    /// Entries still belonging to the active round; 0 when idle.
    round_size: usize,
    rounds: u64,
    completed_pct: f64,
}

impl HeartbeatList {
    /// Empty list that grows in steps of at least `chunk` entries.
    pub const fn new(chunk: usize) -> Self {
        Self {
            entries: Vec::new(),
            chunk: if chunk == 0 { 1 } else { chunk },
            cursor: 0,
            round_size: 0,
            rounds: 0,
            completed_pct: 100.0,
        }
    }

    /// Registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no object is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backing capacity.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Entries in firing order.
    pub fn entries(&self) -> &[HeartbeatEntry] {
        &self.entries
    }

    /// Registered objects in firing order.
    pub fn objects(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|e| e.object).collect()
    }

    /// Position of `object`, searching from the back.
    pub fn position(&self, object: ObjectId) -> Option<usize> {
        self.entries.iter().rposition(|e| e.object == object)
    }

    /// Period of `object`, or 0 when it is not registered.
    pub fn query(&self, object: ObjectId) -> i32 {
        self.position(object).map_or(0, |i| self.entries[i].period)
    }

    /// Append a new entry whose countdown starts at `period`.
    pub fn append(&mut self, object: ObjectId, period: i32) {
        if self.entries.len() == self.entries.capacity() {
            let grow = self.entries.capacity().max(self.chunk);
            self.entries.reserve_exact(grow);
        }
        self.entries.push(HeartbeatEntry {
            object,
            ticks_remaining: period,
            period,
        });
    }

    /// Change the period of a registered object and restart its countdown.
    pub fn update(&mut self, object: ObjectId, period: i32) -> bool {
        match self.position(object) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.period = period;
                entry.ticks_remaining = period;
                true
            }
            None => false,
        }
    }

    /// Remove `object`, compacting the list and correcting the round cursor.
    pub fn remove(&mut self, object: ObjectId) -> bool {
        let Some(index) = self.position(object) else {
            return false;
        };
        if self.round_size > 0 {
            if index < self.cursor {
                self.cursor -= 1;
            }
            if index < self.round_size {
                self.round_size -= 1;
            }
        }
        self.entries.remove(index);
        true
    }

    /// Start a round over the current entries. Returns the round size; an
    /// empty list starts no round.
    pub fn begin_round(&mut self) -> usize {
        self.cursor = 0;
        self.round_size = self.entries.len();
        if self.round_size > 0 {
            self.rounds += 1;
        }
        self.round_size
    }

    /// True while the active round has entries left.
    pub const fn round_active(&self) -> bool {
        self.cursor < self.round_size
    }

    /// Advance to the next entry of the round, returning its index.
    pub fn next_index(&mut self) -> Option<usize> {
        if !self.round_active() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some(index)
    }

    /// Entry at `index`.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut HeartbeatEntry> {
        self.entries.get_mut(index)
    }

    /// Close the round and record how much of it ran.
    pub fn finish_round(&mut self) {
        if self.round_size == 0 {
            return;
        }
        self.completed_pct = if self.cursor < self.round_size {
            #[allow(clippy::cast_precision_loss)]
            let pct = 100.0 * self.cursor as f64 / self.round_size as f64;
            pct
        } else {
            100.0
        };
        self.cursor = 0;
        self.round_size = 0;
    }

    /// Rounds started so far.
    pub const fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Percentage of the last round that completed.
    pub const fn completed_pct(&self) -> f64 {
        self.completed_pct
    }

    /// Structured status.
    pub fn status(&self) -> HeartbeatStatus {
        HeartbeatStatus {
            objects: self.entries.len(),
            rounds: self.rounds,
            completed_pct: self.completed_pct,
        }
    }

    /// Human-readable status report. Only verbose mode produces output.
    pub fn status_report(&self, verbose: bool) -> String {
        let mut out = String::new();
        if verbose {
            out.push_str("Heart beat information:\n");
            out.push_str("-----------------------\n");
            let _ = writeln!(
                out,
                "Number of objects with heart beat: {}, starts: {}",
                self.entries.len(),
                self.rounds
            );
            let _ = writeln!(
                out,
                "Percentage of HB calls completed last time: {:.2}",
                self.completed_pct
            );
        }
        out
    }
}
