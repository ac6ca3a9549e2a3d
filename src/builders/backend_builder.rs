//! Build a backend from configuration.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;

use crate::config::DriverConfig;
use crate::core::audit::InMemoryAuditSink;
use crate::core::backend::Backend;
use crate::core::clock::TimeSource;
use crate::core::error::{AppResult, SchedulerError};
use crate::core::host::ScriptHost;

/// A backend plus the audit sink it records into.
pub type BuiltBackend<H> = (Backend<H>, Arc<Mutex<InMemoryAuditSink>>);

/// Validate `cfg` and build a backend wired to a bounded in-memory audit sink
/// of `cfg.audit_capacity` entries. The sink is returned alongside so admin
/// surfaces can read absorbed failures.
pub fn build_backend<H, T>(cfg: &DriverConfig, host: H, time: T) -> Result<BuiltBackend<H>, SchedulerError>
where
    H: ScriptHost,
    T: TimeSource + 'static,
{
    let audit = Arc::new(Mutex::new(InMemoryAuditSink::new(cfg.audit_capacity)));
    let backend = Backend::new(cfg.clone(), host, time)?.with_audit(audit.clone());
    Ok((backend, audit))
}

/// Load `DRIVER_*` settings through `lookup` and build the backend.
pub fn build_backend_from_lookup<H, T>(
    lookup: impl Fn(&str) -> Option<String>,
    host: H,
    time: T,
) -> AppResult<BuiltBackend<H>>
where
    H: ScriptHost,
    T: TimeSource + 'static,
{
    let cfg = DriverConfig::from_lookup(lookup)
        .map_err(anyhow::Error::msg)
        .context("loading driver configuration")?;
    tracing::info!(
        heartbeat_interval_secs = cfg.heartbeat_interval_secs,
        sweep_interval_secs = cfg.sweep_interval_secs,
        "driver configuration loaded"
    );
    build_backend(&cfg, host, time).context("building backend")
}

/// Startup entry point: read `.env` if present, then build from the process
/// environment.
pub fn build_backend_from_env<H, T>(host: H, time: T) -> AppResult<BuiltBackend<H>>
where
    H: ScriptHost,
    T: TimeSource + 'static,
{
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!(error = %err, "no .env file loaded");
    }
    build_backend_from_lookup(|key| std::env::var(key).ok(), host, time)
}
