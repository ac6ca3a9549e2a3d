//! The driver: every piece of scheduler state on the backend thread.
//!
//! `Driver` owns the virtual clock, the tick queue, the heartbeat list, the
//! object table, the recovery stack and the ambient state those frames
//! protect. Callbacks receive `&mut Driver`, which is how scripts schedule
//! events, change heartbeats or destruct objects from inside a round.
//!
//! The sweep lives in [`crate::core::sweep`] and deferred destruction in
//! [`crate::core::reaper`]; both extend `Driver` with further methods.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::DriverConfig;
use crate::core::audit::{build_audit_event, AuditSink, Boundary};
use crate::core::clock::{VirtualClock, VirtualTime};
use crate::core::error::{fatal, SchedulerError, ScriptError, ScriptResult};
use crate::core::heartbeat::{HeartbeatList, HeartbeatStatus};
use crate::core::host::ScriptHost;
use crate::core::load::{LoadReport, LoadTracker};
use crate::core::object::{ObjectFlags, ObjectId, ObjectSpec, ObjectTable, ScriptObject};
use crate::core::recovery::{AmbientState, FrameToken, RecoveryStack};
use crate::core::shutdown::ShutdownHandle;
use crate::core::tick_queue::{TickEventQueue, TickHandle};
use crate::core::{reaper, sweep};

/// Scheduler state shared by the backend loop and every callback.
pub struct Driver {
    pub(crate) config: DriverConfig,
    pub(crate) clock: VirtualClock,
    pub(crate) ambient: AmbientState,
    pub(crate) recovery: RecoveryStack,
    pub(crate) ticks: TickEventQueue,
    pub(crate) heartbeats: HeartbeatList,
    pub(crate) objects: ObjectTable,
    pub(crate) load: LoadTracker,
    pub(crate) shutdown: ShutdownHandle,
    audit: Option<Arc<Mutex<dyn AuditSink>>>,
}

impl Driver {
    /// Driver whose virtual clock starts at `start`.
    pub fn new(config: DriverConfig, start: VirtualTime) -> Self {
        let heartbeats = HeartbeatList::new(config.heartbeat_chunk);
        Self {
            config,
            clock: VirtualClock::new(start),
            ambient: AmbientState::default(),
            recovery: RecoveryStack::new(),
            ticks: TickEventQueue::new(),
            heartbeats,
            objects: ObjectTable::new(),
            load: LoadTracker::new(start),
            shutdown: ShutdownHandle::new(),
            audit: None,
        }
    }

    /// Attach an audit sink for absorbed failures.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<Mutex<dyn AuditSink>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Active configuration.
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Current virtual time.
    pub const fn now(&self) -> VirtualTime {
        self.clock.now()
    }

    /// Ambient execution state.
    pub const fn ambient(&self) -> &AmbientState {
        &self.ambient
    }

    /// Ambient execution state, for hosts that track call depth or command givers.
    pub const fn ambient_mut(&mut self) -> &mut AmbientState {
        &mut self.ambient
    }

    /// Open recovery frames.
    pub fn recovery_depth(&self) -> usize {
        self.recovery.depth()
    }

    /// Object table.
    pub const fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Object table, for hosts maintaining shadows and program references.
    pub const fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    /// Pending tick events.
    pub const fn tick_queue(&self) -> &TickEventQueue {
        &self.ticks
    }

    /// Heartbeat list.
    pub const fn heartbeats(&self) -> &HeartbeatList {
        &self.heartbeats
    }

    /// Shutdown handle shared with the backend loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    // ---------------------------------------------------------------------
    // Recovery boundaries
    // ---------------------------------------------------------------------

    /// Reset ambient state. Only valid at top level, outside any callback.
    pub fn clear_state(&mut self) {
        self.ambient = AmbientState::default();
    }

    /// Open a recovery frame over the current ambient state.
    pub fn save_context(&mut self) -> FrameToken {
        self.recovery.save(&self.ambient)
    }

    /// Restore ambient state to the frame's snapshot.
    pub fn restore_context(&mut self, frame: &FrameToken) {
        self.recovery.restore(frame, &mut self.ambient);
    }

    /// Close a frame without restoring.
    pub fn pop_context(&mut self, frame: FrameToken) {
        self.recovery.pop(frame);
    }

    /// Run `f` inside its own recovery frame.
    ///
    /// On failure the ambient state is restored before the error is handed
    /// back, so the caller can absorb it and carry on.
    pub fn catch<T>(&mut self, f: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        let frame = self.save_context();
        let result = f(self);
        if result.is_err() {
            self.restore_context(&frame);
        }
        self.pop_context(frame);
        result
    }

    /// Log and audit a failure absorbed at `boundary`.
    pub fn absorb(&self, boundary: Boundary, context: Option<&str>, error: &ScriptError) {
        tracing::warn!(
            boundary = ?boundary,
            context = context.unwrap_or(""),
            object = ?error.object,
            "absorbed script failure: {}",
            error.message
        );
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(boundary, context, error, self.now()));
        }
    }

    // ---------------------------------------------------------------------
    // Tick events and the clock
    // ---------------------------------------------------------------------

    /// Schedule `callback` to run `delay_secs` from now.
    pub fn schedule<F>(&mut self, delay_secs: u64, callback: F) -> TickHandle
    where
        F: FnOnce(&mut Self, &mut dyn ScriptHost) -> ScriptResult<()> + 'static,
    {
        self.schedule_labeled(delay_secs, "call_out", callback)
    }

    /// Schedule with a label that shows up in logs and audit records.
    pub fn schedule_labeled<F>(&mut self, delay_secs: u64, label: &'static str, callback: F) -> TickHandle
    where
        F: FnOnce(&mut Self, &mut dyn ScriptHost) -> ScriptResult<()> + 'static,
    {
        let now = self.clock.now();
        self.ticks.schedule(now, delay_secs, label, Box::new(callback))
    }

    /// Cancel a scheduled event. Returns whether it was still pending.
    pub fn cancel(&mut self, handle: &TickHandle) -> bool {
        TickEventQueue::cancel(handle)
    }

    /// Fire every event due at the current virtual time.
    ///
    /// The due batch leaves the queue before the first callback runs, so
    /// events scheduled for "now" from inside the batch wait for the next
    /// second. One frame guards the batch; a failing event is absorbed and the
    /// rest still run.
    pub fn call_tick_events(&mut self, host: &mut dyn ScriptHost) -> usize {
        let batch = self.ticks.drain_due(self.clock.now());
        if batch.is_empty() {
            return 0;
        }

        let mut fired = 0;
        let frame = self.save_context();
        for event in batch {
            if !event.is_valid() {
                continue;
            }
            let label = event.label();
            fired += 1;
            if let Err(err) = (event.into_callback())(self, &mut *host) {
                self.restore_context(&frame);
                self.absorb(Boundary::TickEvent, Some(label), &err);
            }
        }
        self.pop_context(frame);
        fired
    }

    /// Step virtual time up to `real_now`, draining due events before each
    /// one-second step. Returns the number of steps taken.
    pub fn advance_clock(&mut self, host: &mut dyn ScriptHost, real_now: VirtualTime) -> u64 {
        let mut steps = 0;
        while self.clock.is_behind(real_now) {
            self.call_tick_events(host);
            self.clock.tick();
            steps += 1;
        }
        if steps > 1 {
            tracing::debug!(steps, now = self.clock.now(), "virtual clock caught up");
        }
        steps
    }

    /// Register the recurring maintenance events.
    pub fn register_recurring_events(&mut self) {
        self.schedule_labeled(0, "heart_beat", heart_beat_tick);
        self.schedule_labeled(self.config.sweep_interval_secs, "sweep", sweep::sweep_tick);
        self.schedule_labeled(self.config.reclaim_interval_secs, "reclaim", reaper::reclaim_tick);
        if let Some(interval) = self.config.stats_decay_interval_secs {
            self.schedule_labeled(interval, "stats_decay", stats_decay_tick);
        }
    }

    // ---------------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------------

    /// Create an object and link it onto the live list.
    pub fn create_object(&mut self, spec: ObjectSpec) -> ObjectId {
        let now = self.now();
        let next_reset = now + self.reset_delay();
        let id = self.objects.insert(new_script_object(&spec, now, next_reset));
        tracing::trace!(object = %id, name = %spec.name, "object created");
        id
    }

    /// Destruct an object.
    ///
    /// It leaves the heartbeat list and the live list at once; final teardown
    /// waits for the reaper checkpoint between loop iterations.
    pub fn destruct(&mut self, object: ObjectId) -> Result<(), SchedulerError> {
        if self.objects.is_destructed(object) {
            return Err(SchedulerError::ObjectDestructed(object));
        }
        if self.heartbeats.remove(object) {
            if let Some(ob) = self.objects.get_mut(object) {
                ob.flags.remove(ObjectFlags::HEART_BEAT);
            }
        }
        self.objects.mark_destructed(object)?;
        tracing::debug!(object = %object, "object destructed");
        Ok(())
    }

    /// Record an external reference to `object`, clearing its reset state.
    pub fn touch(&mut self, object: ObjectId) -> Result<(), SchedulerError> {
        let now = self.now();
        match self.objects.get_mut(object) {
            Some(ob) if !ob.is_destructed() => {
                ob.time_of_ref = now;
                ob.flags.remove(ObjectFlags::RESET_STATE);
                Ok(())
            }
            _ => Err(SchedulerError::ObjectDestructed(object)),
        }
    }

    /// Seconds until a freshly reset object is due again.
    pub(crate) fn reset_delay(&self) -> VirtualTime {
        let t = self.config.time_to_reset_secs;
        let half = t / 2;
        if half > 0 {
            half + rand::random_range(0..half)
        } else {
            t
        }
    }

    // ---------------------------------------------------------------------
    // Heartbeats
    // ---------------------------------------------------------------------

    /// Add, update or remove (`period == 0`) a heartbeat.
    pub fn try_set_heart_beat(&mut self, object: ObjectId, period: i32) -> Result<(), SchedulerError> {
        let flags = self
            .objects
            .flags(object)
            .filter(|f| !f.contains(ObjectFlags::DESTRUCTED))
            .ok_or(SchedulerError::ObjectDestructed(object))?;

        if period == 0 {
            if !self.heartbeats.remove(object) {
                return Err(SchedulerError::NotRegistered(object));
            }
            if let Some(ob) = self.objects.get_mut(object) {
                ob.flags.remove(ObjectFlags::HEART_BEAT);
            }
            return Ok(());
        }

        if flags.contains(ObjectFlags::HEART_BEAT) {
            if period < 0 {
                return Err(SchedulerError::InvalidPeriod { object, period });
            }
            if !self.heartbeats.update(object, period) {
                fatal("couldn't find enabled object in heartbeat list");
            }
        } else {
            self.heartbeats.append(object, period.max(1));
            if let Some(ob) = self.objects.get_mut(object) {
                ob.flags.insert(ObjectFlags::HEART_BEAT);
            }
        }
        Ok(())
    }

    /// [`try_set_heart_beat`](Self::try_set_heart_beat) reporting only success.
    pub fn set_heart_beat(&mut self, object: ObjectId, period: i32) -> bool {
        self.try_set_heart_beat(object, period).is_ok()
    }

    /// Heartbeat period of `object`, or 0.
    pub fn query_heart_beat(&self, object: ObjectId) -> i32 {
        match self.objects.flags(object) {
            Some(flags) if flags.contains(ObjectFlags::HEART_BEAT) => self.heartbeats.query(object),
            _ => 0,
        }
    }

    /// Objects on the heartbeat list, in firing order.
    pub fn heart_beat_objects(&self) -> Vec<ObjectId> {
        self.heartbeats.objects()
    }

    /// Human-readable heartbeat report.
    pub fn heart_beat_status(&self, verbose: bool) -> String {
        self.heartbeats.status_report(verbose)
    }

    /// Structured heartbeat status.
    pub fn heart_beat_snapshot(&self) -> HeartbeatStatus {
        self.heartbeats.status()
    }

    /// Follow the shadow chain from `object`; the end of the chain is the
    /// command giver if it can handle commands.
    pub fn resolve_command_giver(&self, host: &dyn ScriptHost, object: ObjectId) -> Option<ObjectId> {
        let mut giver = object;
        let mut hops = 0;
        while let Some(next) = host.shadowing(self, giver) {
            hops += 1;
            if hops > self.objects.live_count() {
                tracing::warn!(object = %object, "shadow chain does not terminate");
                return None;
            }
            giver = next;
        }
        self.objects
            .flags(giver)
            .filter(|f| f.contains(ObjectFlags::ENABLE_COMMANDS) && !f.contains(ObjectFlags::DESTRUCTED))
            .map(|_| giver)
    }

    /// Run one heartbeat round.
    pub fn call_heart_beat(&mut self, host: &mut dyn ScriptHost) {
        self.ambient.current_interactive = None;

        if self.heartbeats.begin_round() > 0 {
            let started = Instant::now();
            let budget = self.config.heartbeat_round_budget();
            let frame = self.save_context();

            while self.heartbeats.round_active() {
                if self.shutdown.is_requested() || budget.is_some_and(|b| started.elapsed() >= b) {
                    tracing::debug!("heartbeat round interrupted");
                    break;
                }
                let Some(index) = self.heartbeats.next_index() else {
                    break;
                };
                let Some(object) = self.tick_entry(index) else {
                    continue;
                };
                if let Err(err) = self.run_heart_beat(host, object) {
                    self.restore_context(&frame);
                    self.absorb(Boundary::HeartBeat, None, &err);
                }
                self.ambient.current_object = None;
            }

            self.pop_context(frame);
            self.heartbeats.finish_round();
        }

        self.ambient.current_heart_beat = None;
    }

    /// Count down the entry at `index`; returns the object when its heartbeat
    /// is due now.
    fn tick_entry(&mut self, index: usize) -> Option<ObjectId> {
        let Some(entry) = self.heartbeats.entry_mut(index) else {
            fatal("heartbeat cursor past the end of the list");
        };
        entry.ticks_remaining -= 1;
        let object = entry.object;

        let Some(flags) = self.objects.flags(object) else {
            fatal("freed object on heartbeat list");
        };
        if !flags.contains(ObjectFlags::HEART_BEAT) {
            fatal("heartbeat not set in object on heartbeat list");
        }
        if flags.contains(ObjectFlags::DESTRUCTED) || !flags.contains(ObjectFlags::HEART_BEAT_FN) {
            return None;
        }

        let entry = self.heartbeats.entry_mut(index)?;
        if entry.ticks_remaining >= 1 {
            return None;
        }
        entry.ticks_remaining = entry.period;
        Some(object)
    }

    fn run_heart_beat(&mut self, host: &mut dyn ScriptHost, object: ObjectId) -> ScriptResult<()> {
        let giver = self.resolve_command_giver(&*host, object);
        let interactive = self
            .objects
            .flags(object)
            .is_some_and(|f| f.contains(ObjectFlags::INTERACTIVE));
        if let Some(ob) = self.objects.get_mut(object) {
            ob.heart_beats += 1;
        }

        host.set_eval_cost(self.config.max_eval_cost);
        let saved_giver = self.ambient.command_giver;
        self.ambient.current_heart_beat = Some(object);
        self.ambient.current_object = Some(object);
        self.ambient.command_giver = giver;
        if interactive {
            self.ambient.current_interactive = Some(object);
        }

        host.heart_beat(self, object).map_err(|e| e.or_object(object))?;

        self.ambient.current_interactive = None;
        self.ambient.command_giver = saved_giver;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Load
    // ---------------------------------------------------------------------

    /// Count one processed command.
    pub fn record_command(&mut self) {
        let now = self.now();
        self.load.record_command(now);
    }

    /// Count compiled lines.
    pub fn record_compiled_lines(&mut self, lines: u64) {
        let now = self.now();
        self.load.record_compiled_lines(now, lines);
    }

    /// `"%.2f cmds/s, %.2f comp lines/s"`.
    pub fn query_load_av(&self) -> String {
        self.load.query_load_av()
    }

    /// Structured load snapshot.
    pub const fn load_report(&self) -> LoadReport {
        self.load.report()
    }
}

/// Build the object record for `spec`, clearing scheduler-owned flags.
pub(crate) fn new_script_object(spec: &ObjectSpec, now: VirtualTime, next_reset: VirtualTime) -> ScriptObject {
    let mut flags = spec.flags;
    flags.remove(
        ObjectFlags::DESTRUCTED | ObjectFlags::HEART_BEAT | ObjectFlags::RESET_STATE,
    );
    ScriptObject {
        name: spec.name.clone(),
        flags,
        next_reset,
        time_of_ref: now,
        load_time: now,
        program_refs: spec.program_refs,
        shadowing: None,
        heart_beats: 0,
        next_all: None,
        prev_all: None,
    }
}

fn heart_beat_tick(driver: &mut Driver, host: &mut dyn ScriptHost) -> ScriptResult<()> {
    let interval = driver.config.heartbeat_interval_secs;
    driver.schedule_labeled(interval, "heart_beat", heart_beat_tick);
    driver.call_heart_beat(host);
    Ok(())
}

fn stats_decay_tick(driver: &mut Driver, host: &mut dyn ScriptHost) -> ScriptResult<()> {
    if let Some(interval) = driver.config.stats_decay_interval_secs {
        driver.schedule_labeled(interval, "stats_decay", stats_decay_tick);
    }
    host.decay_stats(driver);
    Ok(())
}
