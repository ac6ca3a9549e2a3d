//! The backend loop.
//!
//! Each iteration reaps pending destructions, honours shutdown requests,
//! hands one slice of wall time to the I/O poller and then steps the virtual
//! clock up to real time, draining due tick events at every step. A root
//! recovery frame catches whatever escapes the poller so the loop never
//! unwinds on a script failure.
//!
//! ```rust,ignore
//! use driver_backend::config::DriverConfig;
//! use driver_backend::core::{Backend, SystemTimeSource};
//! use driver_backend::runtime::SleepPoller;
//!
//! let mut backend = Backend::new(DriverConfig::from_env()?, MyHost::new(), SystemTimeSource)?;
//! backend.start();
//! backend.preload_objects(false);
//! backend.run(&mut SleepPoller);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DriverConfig;
use crate::core::audit::{AuditSink, Boundary};
use crate::core::clock::TimeSource;
use crate::core::driver::Driver;
use crate::core::error::SchedulerError;
use crate::core::host::{IoPoller, ScriptHost};
use crate::core::recovery::FrameToken;
use crate::core::shutdown::ShutdownHandle;

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Keep looping.
    Continue,
    /// A shutdown was requested.
    Shutdown,
}

/// The driver, its host and the wall clock, run as one loop.
pub struct Backend<H: ScriptHost> {
    driver: Driver,
    host: H,
    time: Box<dyn TimeSource>,
    root: Option<FrameToken>,
}

impl<H: ScriptHost> Backend<H> {
    /// Validate `config` and build a backend whose virtual clock starts at the
    /// current real time.
    pub fn new(
        config: DriverConfig,
        host: H,
        time: impl TimeSource + 'static,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let start = time.now_secs();
        Ok(Self {
            driver: Driver::new(config, start),
            host,
            time: Box::new(time),
            root: None,
        })
    }

    /// Attach an audit sink for absorbed failures.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<Mutex<dyn AuditSink>>) -> Self {
        self.driver = self.driver.with_audit(audit);
        self
    }

    /// Scheduler state.
    pub const fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Scheduler state, mutably.
    pub const fn driver_mut(&mut self) -> &mut Driver {
        &mut self.driver
    }

    /// Script host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Script host, mutably.
    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Driver and host together, for running scripts outside the loop.
    pub fn parts_mut(&mut self) -> (&mut Driver, &mut H) {
        (&mut self.driver, &mut self.host)
    }

    /// Handle for requesting shutdown from other threads.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.driver.shutdown_handle()
    }

    /// True once [`start`](Self::start) has run and [`stop`](Self::stop) has not.
    pub const fn is_started(&self) -> bool {
        self.root.is_some()
    }

    /// Open the root frame, register the recurring events and catch the
    /// virtual clock up to real time. Idempotent.
    pub fn start(&mut self) {
        if self.root.is_some() {
            return;
        }
        self.driver.clear_state();
        self.root = Some(self.driver.save_context());
        self.driver.register_recurring_events();
        let real = self.time.now_secs();
        self.driver.clock.sync_to(real);
        tracing::info!(virtual_time = self.driver.now(), "backend started");
    }

    /// Run one loop iteration with `poller` handling I/O.
    pub fn run_once(&mut self, poller: &mut dyn IoPoller) -> LoopControl {
        self.start();
        self.driver.clear_state();

        if self.driver.objects.has_pending() {
            self.driver.remove_destructed_objects(&mut self.host);
        }

        if self.driver.shutdown.is_requested() {
            return LoopControl::Shutdown;
        }
        if let Some(minutes) = self.driver.shutdown.take_slow() {
            tracing::info!(minutes, "slow shutdown requested");
            let host = &mut self.host;
            if let Err(err) = self.driver.catch(|d| host.slow_shutdown(d, minutes)) {
                self.driver.absorb(Boundary::Shutdown, None, &err);
            }
        }

        let slice = self.driver.config.io_slice();
        if let Err(err) = poller.poll(&mut self.driver, &mut self.host, slice) {
            if let Some(root) = &self.root {
                self.driver.restore_context(root);
            }
            self.driver.absorb(Boundary::Backend, None, &err);
        }

        let real = self.time.now_secs();
        self.driver.advance_clock(&mut self.host, real);
        LoopControl::Continue
    }

    /// Loop until shutdown is requested, then stop. Returns the number of
    /// iterations run.
    pub fn run(&mut self, poller: &mut dyn IoPoller) -> u64 {
        let mut iterations = 0;
        while self.run_once(poller) == LoopControl::Continue {
            iterations += 1;
        }
        self.stop();
        iterations
    }

    /// Drop every pending tick event and close the root frame.
    pub fn stop(&mut self) {
        self.driver.ticks.clear();
        if let Some(root) = self.root.take() {
            self.driver.pop_context(root);
        }
        tracing::info!(virtual_time = self.driver.now(), "backend stopped");
    }

    /// Ask the host for the preload list and load each file.
    ///
    /// A failing epilog abandons preloading; a failing file is skipped.
    /// Returns the number of files loaded.
    pub fn preload_objects(&mut self, eflag: bool) -> usize {
        let host = &mut self.host;
        let files = match self.driver.catch(|d| host.epilog(d, eflag)) {
            Ok(Some(files)) => files,
            Ok(None) => return 0,
            Err(err) => {
                self.driver.absorb(Boundary::Preload, Some("epilog"), &err);
                return 0;
            }
        };

        tracing::info!(files = files.len(), "loading preloaded files");
        let cost = self.driver.config.max_eval_cost;
        let mut loaded = 0;
        for file in &files {
            let host = &mut self.host;
            let result = self.driver.catch(|d| {
                host.set_eval_cost(cost);
                host.preload(d, file)
            });
            match result {
                Ok(()) => loaded += 1,
                Err(err) => self.driver.absorb(Boundary::Preload, Some(file.as_str()), &err),
            }
        }
        tracing::info!(loaded, total = files.len(), "preload finished");
        loaded
    }
}
