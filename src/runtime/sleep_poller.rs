//! A poller with no I/O to do.

use std::time::Duration;

use crate::core::driver::Driver;
use crate::core::error::ScriptResult;
use crate::core::host::{IoPoller, ScriptHost};

/// Sleeps through each I/O slice. Useful for headless drivers and tests that
/// only exercise the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepPoller;

impl IoPoller for SleepPoller {
    fn poll(
        &mut self,
        _driver: &mut Driver,
        _host: &mut dyn ScriptHost,
        slice: Duration,
    ) -> ScriptResult<()> {
        std::thread::sleep(slice);
        Ok(())
    }
}
