//! Periodic reset and clean-up walk over the live object list.
//!
//! Objects visited by the walk may destruct themselves, or their neighbours,
//! from inside `reset` or `clean_up`. The walk remembers the last object it
//! finished with; when the object it is about to visit turns out to be
//! destructed it resumes from that object's current successor, or from the
//! head of the list if the last good object is gone too.

use serde::{Deserialize, Serialize};

use crate::core::audit::Boundary;
use crate::core::driver::Driver;
use crate::core::error::ScriptResult;
use crate::core::host::ScriptHost;
use crate::core::object::{ObjectFlags, ObjectId};

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Objects visited.
    pub visited: usize,
    /// `reset` calls made.
    pub resets: usize,
    /// `clean_up` calls made.
    pub clean_ups: usize,
    /// Times the walk had to resume past a destructed object.
    pub restarts: usize,
    /// Visits aborted by a script failure.
    pub failures: usize,
}

/// Recurring tick: reschedule, then sweep.
pub(crate) fn sweep_tick(driver: &mut Driver, host: &mut dyn ScriptHost) -> ScriptResult<()> {
    let interval = driver.config.sweep_interval_secs;
    driver.schedule_labeled(interval, "sweep", sweep_tick);
    driver.look_for_objects_to_swap(host);
    Ok(())
}

impl Driver {
    /// Walk every live object once, resetting and cleaning up as due.
    ///
    /// A single recovery frame covers the whole walk. A failing object is
    /// abandoned and the walk carries on with its successor.
    pub fn look_for_objects_to_swap(&mut self, host: &mut dyn ScriptHost) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut next = self.objects.head();
        let mut last_good: Option<ObjectId> = None;
        let frame = self.save_context();

        while let Some(candidate) = next {
            let object = if self.objects.is_destructed(candidate) {
                stats.restarts += 1;
                let resume = match last_good.filter(|&good| !self.objects.is_destructed(good)) {
                    Some(good) => self.objects.next_live(good),
                    None => self.objects.head(),
                };
                let Some(object) = resume else {
                    break;
                };
                object
            } else {
                candidate
            };

            next = self.objects.next_live(object);
            stats.visited += 1;
            match self.sweep_object(host, object, &mut stats) {
                Ok(true) => last_good = Some(object),
                Ok(false) => {}
                Err(err) => {
                    stats.failures += 1;
                    self.restore_context(&frame);
                    // Still finished with, so a resume never revisits it.
                    if !self.objects.is_destructed(object) {
                        last_good = Some(object);
                    }
                    let name = self.objects.get(object).map(|ob| ob.name.clone());
                    self.absorb(Boundary::Sweep, name.as_deref(), &err.or_object(object));
                }
            }
            self.ambient.current_object = None;
        }

        self.pop_context(frame);
        tracing::debug!(
            visited = stats.visited,
            resets = stats.resets,
            clean_ups = stats.clean_ups,
            failures = stats.failures,
            "sweep finished"
        );
        stats
    }

    /// Visit one object. Returns whether it is still alive afterwards.
    fn sweep_object(
        &mut self,
        host: &mut dyn ScriptHost,
        object: ObjectId,
        stats: &mut SweepStats,
    ) -> ScriptResult<bool> {
        let now = self.now();
        let time_to_clean_up = self.config.time_to_clean_up_secs;
        let Some(ob) = self.objects.get(object) else {
            return Ok(false);
        };

        // Decided before reset, which may touch the object.
        let ready_for_clean_up = now - ob.time_of_ref >= time_to_clean_up;

        if self.config.time_to_reset_secs > 0
            && ob.flags.contains(ObjectFlags::WILL_RESET)
            && !ob.flags.contains(ObjectFlags::RESET_STATE)
            && ob.next_reset <= now
        {
            tracing::debug!(object = %object, name = %ob.name, "reset");
            stats.resets += 1;
            self.reset_object(host, object)?;
            if self.objects.is_destructed(object) {
                return Ok(false);
            }
        }

        if time_to_clean_up <= 0 || !ready_for_clean_up {
            return Ok(true);
        }
        let Some(ob) = self.objects.get(object) else {
            return Ok(false);
        };
        if !ob.flags.contains(ObjectFlags::WILL_CLEAN_UP) {
            return Ok(true);
        }

        let saved_reset_state = ob.flags.contains(ObjectFlags::RESET_STATE);
        let inherited = if ob.flags.contains(ObjectFlags::CLONE) {
            0
        } else {
            ob.program_refs
        };
        tracing::debug!(object = %object, name = %ob.name, inherited, "clean up");
        stats.clean_ups += 1;

        host.set_eval_cost(self.config.max_eval_cost);
        self.ambient.current_object = Some(object);
        self.ambient.command_giver = None;
        let keep = host
            .clean_up(self, object, inherited)
            .map_err(|e| e.or_object(object))?;

        if self.objects.is_destructed(object) {
            return Ok(false);
        }
        if let Some(ob) = self.objects.get_mut(object) {
            if !keep {
                ob.flags.remove(ObjectFlags::WILL_CLEAN_UP);
            }
            if saved_reset_state {
                ob.flags.insert(ObjectFlags::RESET_STATE);
            }
        }
        Ok(true)
    }

    /// Reset `object`: schedule its next reset, mark it reset, then call the host.
    pub(crate) fn reset_object(
        &mut self,
        host: &mut dyn ScriptHost,
        object: ObjectId,
    ) -> ScriptResult<()> {
        let next_reset = self.now() + self.reset_delay();
        if let Some(ob) = self.objects.get_mut(object) {
            ob.next_reset = next_reset;
            ob.flags.insert(ObjectFlags::RESET_STATE);
        }
        host.set_eval_cost(self.config.max_eval_cost);
        self.ambient.current_object = Some(object);
        self.ambient.command_giver = None;
        host.reset(self, object).map_err(|e| e.or_object(object))
    }
}
