//! Exponentially decayed throughput averages.
//!
//! Samples accumulate into a bucket for the current virtual second. The
//! published average only moves when virtual time has advanced since the last
//! update; the decay then accounts for every second that passed, however many.

use serde::{Deserialize, Serialize};

use crate::core::clock::VirtualTime;

/// Decay time constant in seconds.
const DECAY_SECS: f64 = 900.0;

/// Elapsed-second counts served from the lookup table.
const NUM_CONSTS: usize = 5;

/// Coefficient table for small gaps; `exp(-n / 900)` for `n < NUM_CONSTS`.
fn const_table() -> [f64; NUM_CONSTS] {
    let mut table = [0.0; NUM_CONSTS];
    for (n, slot) in table.iter_mut().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        *slot = (-n / DECAY_SECS).exp();
    }
    table
}

/// One running average.
#[derive(Debug, Clone)]
pub struct LoadAverage {
    value: f64,
    acc: u64,
    last_time: VirtualTime,
    consts: [f64; NUM_CONSTS],
}

impl LoadAverage {
    /// Average starting at zero, anchored at `start`.
    pub fn new(start: VirtualTime) -> Self {
        Self {
            value: 0.0,
            acc: 0,
            last_time: start,
            consts: const_table(),
        }
    }

    /// Published average.
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Activity accumulated since the last update.
    pub const fn pending(&self) -> u64 {
        self.acc
    }

    /// Decay coefficient for `elapsed` seconds.
    pub fn coefficient(&self, elapsed: u64) -> f64 {
        usize::try_from(elapsed)
            .ok()
            .and_then(|n| self.consts.get(n).copied())
            .unwrap_or_else(|| {
                #[allow(clippy::cast_precision_loss)]
                let n = elapsed as f64;
                (-n / DECAY_SECS).exp()
            })
    }

    /// Add `amount` of activity observed at `now`.
    pub fn sample(&mut self, now: VirtualTime, amount: u64) {
        self.acc = self.acc.saturating_add(amount);
        if now <= self.last_time {
            return;
        }
        let elapsed = now.abs_diff(self.last_time);
        let c = self.coefficient(elapsed);
        #[allow(clippy::cast_precision_loss)]
        let (acc, n) = (self.acc as f64, elapsed as f64);
        self.value = c.mul_add(self.value, acc * (1.0 - c) / n);
        self.last_time = now;
        self.acc = 0;
    }
}

/// Snapshot of both averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Commands per second.
    pub commands_per_sec: f64,
    /// Compiled lines per second.
    pub compile_lines_per_sec: f64,
}

/// Command and compile throughput.
#[derive(Debug, Clone)]
pub struct LoadTracker {
    commands: LoadAverage,
    compile: LoadAverage,
}

impl LoadTracker {
    /// Both averages anchored at `start`.
    pub fn new(start: VirtualTime) -> Self {
        Self {
            commands: LoadAverage::new(start),
            compile: LoadAverage::new(start),
        }
    }

    /// Count one processed command.
    pub fn record_command(&mut self, now: VirtualTime) {
        self.commands.sample(now, 1);
    }

    /// Count `lines` compiled lines.
    pub fn record_compiled_lines(&mut self, now: VirtualTime, lines: u64) {
        self.compile.sample(now, lines);
    }

    /// Command average.
    pub const fn commands(&self) -> &LoadAverage {
        &self.commands
    }

    /// Compile average.
    pub const fn compile(&self) -> &LoadAverage {
        &self.compile
    }

    /// Structured snapshot.
    pub const fn report(&self) -> LoadReport {
        LoadReport {
            commands_per_sec: self.commands.value(),
            compile_lines_per_sec: self.compile.value(),
        }
    }

    /// `"%.2f cmds/s, %.2f comp lines/s"`.
    pub fn query_load_av(&self) -> String {
        format!(
            "{:.2} cmds/s, {:.2} comp lines/s",
            self.commands.value(),
            self.compile.value()
        )
    }
}
