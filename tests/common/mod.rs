//! Scriptable host and poller shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use driver_backend::core::{
    Driver, IoPoller, ManualTimeSource, ObjectId, ScriptError, ScriptHost, ScriptResult,
    ShutdownHandle,
};

type Script = Box<dyn FnMut(&mut Driver, ObjectId) -> ScriptResult<()>>;
type CleanUpScript = Box<dyn FnMut(&mut Driver, ObjectId, u32) -> ScriptResult<bool>>;

/// Host that records every call and runs per-object scripts.
#[derive(Default)]
pub struct TestHost {
    pub calls: Vec<(&'static str, ObjectId)>,
    pub eval_costs: Vec<u64>,
    pub finalized: Vec<ObjectId>,
    pub preload_list: Option<Vec<String>>,
    pub failing_preloads: Vec<String>,
    pub fail_epilog: bool,
    pub preloaded: Vec<String>,
    pub slow_shutdowns: Vec<u32>,
    pub reclaims: usize,
    heart_beats: HashMap<ObjectId, Script>,
    resets: HashMap<ObjectId, Script>,
    clean_ups: HashMap<ObjectId, CleanUpScript>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_heart_beat(
        &mut self,
        object: ObjectId,
        script: impl FnMut(&mut Driver, ObjectId) -> ScriptResult<()> + 'static,
    ) {
        self.heart_beats.insert(object, Box::new(script));
    }

    pub fn on_reset(
        &mut self,
        object: ObjectId,
        script: impl FnMut(&mut Driver, ObjectId) -> ScriptResult<()> + 'static,
    ) {
        self.resets.insert(object, Box::new(script));
    }

    pub fn on_clean_up(
        &mut self,
        object: ObjectId,
        script: impl FnMut(&mut Driver, ObjectId, u32) -> ScriptResult<bool> + 'static,
    ) {
        self.clean_ups.insert(object, Box::new(script));
    }

    /// Calls of `kind` made on `object`.
    pub fn count(&self, kind: &str, object: ObjectId) -> usize {
        self.calls
            .iter()
            .filter(|(k, o)| *k == kind && *o == object)
            .count()
    }

    /// Objects that received calls of `kind`, in call order.
    pub fn visited(&self, kind: &str) -> Vec<ObjectId> {
        self.calls
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, o)| *o)
            .collect()
    }
}

impl ScriptHost for TestHost {
    fn set_eval_cost(&mut self, cost: u64) {
        self.eval_costs.push(cost);
    }

    fn heart_beat(&mut self, driver: &mut Driver, object: ObjectId) -> ScriptResult<()> {
        self.calls.push(("heart_beat", object));
        match self.heart_beats.get_mut(&object) {
            Some(script) => script(driver, object),
            None => Ok(()),
        }
    }

    fn reset(&mut self, driver: &mut Driver, object: ObjectId) -> ScriptResult<()> {
        self.calls.push(("reset", object));
        match self.resets.get_mut(&object) {
            Some(script) => script(driver, object),
            None => Ok(()),
        }
    }

    fn clean_up(&mut self, driver: &mut Driver, object: ObjectId, inherited: u32) -> ScriptResult<bool> {
        self.calls.push(("clean_up", object));
        match self.clean_ups.get_mut(&object) {
            Some(script) => script(driver, object, inherited),
            None => Ok(true),
        }
    }

    fn finalize(&mut self, _driver: &mut Driver, object: ObjectId) {
        self.finalized.push(object);
    }

    fn reclaim(&mut self, _driver: &mut Driver) -> usize {
        self.reclaims += 1;
        0
    }

    fn epilog(&mut self, _driver: &mut Driver, _eflag: bool) -> ScriptResult<Option<Vec<String>>> {
        if self.fail_epilog {
            return Err(ScriptError::new("epilog failed"));
        }
        Ok(self.preload_list.clone())
    }

    fn preload(&mut self, _driver: &mut Driver, file: &str) -> ScriptResult<()> {
        if self.failing_preloads.iter().any(|f| f == file) {
            return Err(ScriptError::new(format!("cannot load {file}")));
        }
        self.preloaded.push(file.to_owned());
        Ok(())
    }

    fn slow_shutdown(&mut self, _driver: &mut Driver, minutes: u32) -> ScriptResult<()> {
        self.slow_shutdowns.push(minutes);
        Ok(())
    }
}

/// Poller that advances a manual clock instead of waiting on sockets.
pub struct StepPoller {
    pub time: ManualTimeSource,
    pub step: i64,
    pub polls: usize,
    pub fail_on: Option<usize>,
    pub shutdown_on: Option<(usize, ShutdownHandle)>,
}

impl StepPoller {
    pub fn new(time: ManualTimeSource, step: i64) -> Self {
        Self {
            time,
            step,
            polls: 0,
            fail_on: None,
            shutdown_on: None,
        }
    }
}

impl IoPoller for StepPoller {
    fn poll(
        &mut self,
        driver: &mut Driver,
        _host: &mut dyn ScriptHost,
        _slice: Duration,
    ) -> ScriptResult<()> {
        self.polls += 1;
        self.time.advance(self.step);
        if let Some((at, handle)) = &self.shutdown_on {
            if *at == self.polls {
                handle.request_shutdown();
            }
        }
        if self.fail_on == Some(self.polls) {
            driver.ambient_mut().stack_depth = 99;
            return Err(ScriptError::new("command failed"));
        }
        Ok(())
    }
}
