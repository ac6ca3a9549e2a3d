//! Tests for load averages

use driver_backend::config::DriverConfig;
use driver_backend::core::{Driver, LoadAverage};

#[test]
fn test_query_load_av_starts_at_zero() {
    let driver = Driver::new(DriverConfig::default(), 0);
    assert_eq!(driver.query_load_av(), "0.00 cmds/s, 0.00 comp lines/s");
}

#[test]
fn test_steady_rate_converges() {
    let mut avg = LoadAverage::new(0);
    for t in 1..=20_000 {
        avg.sample(t, 3);
    }
    assert!((avg.value() - 3.0).abs() < 0.01);
}

#[test]
fn test_gap_folds_accumulated_activity() {
    let mut avg = LoadAverage::new(0);
    avg.sample(0, 900);
    avg.sample(10, 0);
    let c = (-10.0_f64 / 900.0).exp();
    let expected = 900.0 * (1.0 - c) / 10.0;
    assert!((avg.value() - expected).abs() < 1e-9);
    assert_eq!(avg.pending(), 0);
}

#[test]
fn test_driver_records_at_virtual_time() {
    let mut driver = Driver::new(DriverConfig::default(), 0);
    driver.record_command();
    driver.record_compiled_lines(400);
    assert_eq!(driver.query_load_av(), "0.00 cmds/s, 0.00 comp lines/s");

    let mut host = NullHost;
    driver.advance_clock(&mut host, 1);
    driver.record_command();
    driver.record_compiled_lines(0);
    let report = driver.load_report();
    assert!(report.commands_per_sec > 0.0);
    assert!(report.compile_lines_per_sec > report.commands_per_sec);
    assert!(driver.query_load_av().ends_with("comp lines/s"));
}

struct NullHost;

impl driver_backend::core::ScriptHost for NullHost {
    fn set_eval_cost(&mut self, _cost: u64) {}

    fn heart_beat(
        &mut self,
        _driver: &mut Driver,
        _object: driver_backend::core::ObjectId,
    ) -> driver_backend::core::ScriptResult<()> {
        Ok(())
    }
}
