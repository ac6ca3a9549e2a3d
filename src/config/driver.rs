//! Driver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduling and maintenance settings for the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Seconds between heartbeat rounds.
    pub heartbeat_interval_secs: u64,
    /// Seconds between reset / clean-up sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds between reference reclamation passes.
    pub reclaim_interval_secs: u64,
    /// Seconds between statistics decay passes; disabled when absent.
    pub stats_decay_interval_secs: Option<u64>,
    /// Idle seconds before an object is offered `clean_up`; 0 disables clean-up.
    pub time_to_clean_up_secs: i64,
    /// Nominal seconds between resets; the real delay is jittered in
    /// `[t/2, t)`. 0 disables resets.
    pub time_to_reset_secs: i64,
    /// Cost budget handed to the host before each callback.
    pub max_eval_cost: u64,
    /// Minimum growth step of the heartbeat list.
    pub heartbeat_chunk: usize,
    /// Wall-clock budget for one heartbeat round; unbounded when absent.
    pub heartbeat_round_budget_ms: Option<u64>,
    /// Length of one I/O polling slice.
    pub io_slice_ms: u64,
    /// Absorbed failures kept by the in-memory audit sink.
    pub audit_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 1,
            sweep_interval_secs: 5 * 60,
            reclaim_interval_secs: 60,
            stats_decay_interval_secs: None,
            time_to_clean_up_secs: 600,
            time_to_reset_secs: 900,
            max_eval_cost: 1_000_000,
            heartbeat_chunk: 32,
            heartbeat_round_budget_ms: None,
            io_slice_ms: 1000,
            audit_capacity: 256,
        }
    }
}

impl DriverConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_secs == 0 {
            return Err("heartbeat_interval_secs must be greater than 0".into());
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".into());
        }
        if self.reclaim_interval_secs == 0 {
            return Err("reclaim_interval_secs must be greater than 0".into());
        }
        if self.stats_decay_interval_secs == Some(0) {
            return Err("stats_decay_interval_secs must be greater than 0".into());
        }
        if self.time_to_clean_up_secs < 0 {
            return Err("time_to_clean_up_secs must not be negative".into());
        }
        if self.time_to_reset_secs < 0 {
            return Err("time_to_reset_secs must not be negative".into());
        }
        if self.max_eval_cost == 0 {
            return Err("max_eval_cost must be greater than 0".into());
        }
        if self.heartbeat_chunk == 0 {
            return Err("heartbeat_chunk must be greater than 0".into());
        }
        if self.io_slice_ms == 0 {
            return Err("io_slice_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DRIVER_*` environment variables (after
    /// loading a `.env` file if present) and validate.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            slot: &mut T,
        ) -> Result<(), String>
        where
            T::Err: std::fmt::Display,
        {
            if let Some(raw) = lookup(key) {
                *slot = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        parse(&lookup, "DRIVER_HEARTBEAT_INTERVAL_SECS", &mut cfg.heartbeat_interval_secs)?;
        parse(&lookup, "DRIVER_SWEEP_INTERVAL_SECS", &mut cfg.sweep_interval_secs)?;
        parse(&lookup, "DRIVER_RECLAIM_INTERVAL_SECS", &mut cfg.reclaim_interval_secs)?;
        parse(&lookup, "DRIVER_TIME_TO_CLEAN_UP_SECS", &mut cfg.time_to_clean_up_secs)?;
        parse(&lookup, "DRIVER_TIME_TO_RESET_SECS", &mut cfg.time_to_reset_secs)?;
        parse(&lookup, "DRIVER_MAX_EVAL_COST", &mut cfg.max_eval_cost)?;
        parse(&lookup, "DRIVER_HEARTBEAT_CHUNK", &mut cfg.heartbeat_chunk)?;
        parse(&lookup, "DRIVER_IO_SLICE_MS", &mut cfg.io_slice_ms)?;
        parse(&lookup, "DRIVER_AUDIT_CAPACITY", &mut cfg.audit_capacity)?;

        let mut decay = 0_u64;
        parse(&lookup, "DRIVER_STATS_DECAY_INTERVAL_SECS", &mut decay)?;
        if decay > 0 {
            cfg.stats_decay_interval_secs = Some(decay);
        }
        let mut budget = 0_u64;
        parse(&lookup, "DRIVER_HEARTBEAT_ROUND_BUDGET_MS", &mut budget)?;
        if budget > 0 {
            cfg.heartbeat_round_budget_ms = Some(budget);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// I/O slice as a duration.
    pub const fn io_slice(&self) -> Duration {
        Duration::from_millis(self.io_slice_ms)
    }

    /// Heartbeat round budget as a duration.
    pub fn heartbeat_round_budget(&self) -> Option<Duration> {
        self.heartbeat_round_budget_ms.map(Duration::from_millis)
    }
}
