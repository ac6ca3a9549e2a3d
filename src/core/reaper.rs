//! Deferred finalization of destructed objects.
//!
//! [`Driver::destruct`] only flags an object and moves it onto the pending
//! list, so walks in progress never see a freed slot. The backend loop calls
//! [`Driver::remove_destructed_objects`] between iterations, outside any
//! callback, to tear the pending objects down for good.

use crate::core::driver::Driver;
use crate::core::error::{fatal, ScriptResult};
use crate::core::host::ScriptHost;

/// Recurring tick: reschedule, then let the host drop stale references.
pub(crate) fn reclaim_tick(driver: &mut Driver, host: &mut dyn ScriptHost) -> ScriptResult<()> {
    let interval = driver.config.reclaim_interval_secs;
    driver.schedule_labeled(interval, "reclaim", reclaim_tick);
    let cleared = host.reclaim(driver);
    if cleared > 0 {
        tracing::debug!(cleared, "reclaimed references to destructed objects");
    }
    Ok(())
}

impl Driver {
    /// Finalize and free every pending destructed object. Returns how many
    /// were freed.
    pub fn remove_destructed_objects(&mut self, host: &mut dyn ScriptHost) -> usize {
        if self.ambient.current_object.is_some() {
            fatal("remove_destructed_objects called inside a callback");
        }

        let mut freed = 0;
        // Finalizers may destruct further objects; keep going until the list stays empty.
        while self.objects.has_pending() {
            for object in self.objects.take_pending() {
                host.finalize(self, object);
                if self.objects.free(object).is_some() {
                    freed += 1;
                }
            }
        }
        if freed > 0 {
            tracing::debug!(freed, "reaped destructed objects");
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::core::object::{ObjectId, ObjectSpec};

    #[derive(Default)]
    struct Host {
        finalized: Vec<ObjectId>,
        chain: Option<ObjectId>,
    }

    impl ScriptHost for Host {
        fn set_eval_cost(&mut self, _cost: u64) {}

        fn heart_beat(&mut self, _driver: &mut Driver, _object: ObjectId) -> ScriptResult<()> {
            Ok(())
        }

        fn finalize(&mut self, driver: &mut Driver, object: ObjectId) {
            self.finalized.push(object);
            if let Some(next) = self.chain.take() {
                driver.destruct(next).unwrap();
            }
        }
    }

    #[test]
    fn test_reaper_frees_and_invalidates() {
        let mut driver = Driver::new(DriverConfig::default(), 0);
        let a = driver.create_object(ObjectSpec::new("a"));
        let b = driver.create_object(ObjectSpec::new("b"));
        driver.destruct(a).unwrap();

        let mut host = Host::default();
        assert_eq!(driver.remove_destructed_objects(&mut host), 1);
        assert_eq!(host.finalized, vec![a]);
        assert!(driver.objects().get(a).is_none());
        assert!(driver.objects().get(b).is_some());
        assert!(!driver.objects().has_pending());
    }

    #[test]
    fn test_destruct_during_finalize_is_reaped() {
        let mut driver = Driver::new(DriverConfig::default(), 0);
        let a = driver.create_object(ObjectSpec::new("a"));
        let b = driver.create_object(ObjectSpec::new("b"));
        driver.destruct(a).unwrap();

        let mut host = Host {
            chain: Some(b),
            ..Host::default()
        };
        assert_eq!(driver.remove_destructed_objects(&mut host), 2);
        assert_eq!(host.finalized, vec![a, b]);
        assert_eq!(driver.objects().live_count(), 0);
    }

    #[test]
    #[should_panic(expected = "inside a callback")]
    fn test_reaping_inside_callback_is_fatal() {
        let mut driver = Driver::new(DriverConfig::default(), 0);
        let a = driver.create_object(ObjectSpec::new("a"));
        driver.ambient_mut().current_object = Some(a);
        driver.remove_destructed_objects(&mut Host::default());
    }
}
