//! Serializable status models for admin surfaces.

use serde::{Deserialize, Serialize};

use crate::core::clock::VirtualTime;
use crate::core::driver::Driver;
use crate::core::heartbeat::HeartbeatStatus;
use crate::core::load::LoadReport;

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSnapshot {
    /// Current virtual time.
    pub virtual_time: VirtualTime,
    /// Objects on the live list.
    pub live_objects: usize,
    /// Destructed objects waiting for the reaper.
    pub pending_destructions: usize,
    /// Tick events still queued, cancelled ones included.
    pub queued_events: usize,
    /// Virtual time of the earliest queued event.
    pub next_event_due: Option<VirtualTime>,
    /// Heartbeat subsystem status.
    pub heartbeat: HeartbeatStatus,
    /// Load averages.
    pub load: LoadReport,
    /// Open recovery frames.
    pub recovery_depth: usize,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Capture a snapshot of `driver`.
pub fn snapshot(driver: &Driver) -> DriverSnapshot {
    DriverSnapshot {
        virtual_time: driver.now(),
        live_objects: driver.objects().live_count(),
        pending_destructions: driver.objects().pending().len(),
        queued_events: driver.tick_queue().len(),
        next_event_due: driver.tick_queue().next_due(),
        heartbeat: driver.heart_beat_snapshot(),
        load: driver.load_report(),
        recovery_depth: driver.recovery_depth(),
    }
}

/// Health check. A driver is healthy while no shutdown has been requested.
pub fn health(driver: &Driver) -> Health {
    Health {
        ok: !driver.shutdown_handle().is_requested(),
    }
}
