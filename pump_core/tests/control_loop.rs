use std::sync::Arc;

use pump_core::mocks::{RecordingActuator, ScriptedSensor, triangle_wave};
use pump_core::{
    AbortReason, DosingControlLoop, PumpCfg, PumpError, SafetyCfg, SamplingCfg,
};
use pump_traits::clock::test_clock::ManualClock;
use rstest::rstest;

const PERIOD_US: u64 = 1_000;

fn pump_loop(
    sensor: ScriptedSensor,
    lookahead: usize,
    max_run_ms: u64,
) -> (DosingControlLoop<RecordingActuator, ScriptedSensor>, RecordingActuator) {
    let actuator = RecordingActuator::new();
    let ctl = DosingControlLoop::new(
        actuator.clone(),
        sensor,
        Arc::new(ManualClock::new()),
        PumpCfg {
            lookahead,
            pulses_per_ml: 10.0,
            approx_samples_per_pulse: 0,
        },
        SamplingCfg {
            period_us: PERIOD_US,
        },
        SafetyCfg { max_run_ms },
    );
    (ctl, actuator)
}

#[test]
fn zero_pulses_is_rejected_without_touching_hardware() {
    let (mut ctl, actuator) = pump_loop(ScriptedSensor::new([100]).failing_after(0), 2, 0);
    let err = ctl.run_for_pulses(0, true).unwrap_err();
    assert!(matches!(err, PumpError::InvalidRequest(_)));
    assert!(actuator.commands().is_empty());
    assert_eq!(ctl.baseline(), None);
}

#[rstest]
#[case(0.5, false)]
#[case(0.0, false)]
#[case(-3.0, false)]
#[case(f32::NAN, false)]
#[case(f32::INFINITY, false)]
#[case(0.6, true)]
#[case(12.5, true)]
fn volume_threshold(#[case] ml: f32, #[case] supported: bool) {
    let (ctl, _) = pump_loop(ScriptedSensor::new([100]), 2, 0);
    assert_eq!(ctl.volume_supported(ml), supported);
}

#[test]
fn sub_threshold_volume_never_starts() {
    let (mut ctl, actuator) = pump_loop(ScriptedSensor::new([100]), 2, 0);
    let err = ctl.run_for_ml(0.5, false).unwrap_err();
    assert!(matches!(err, PumpError::InvalidRequest(_)));
    assert!(actuator.commands().is_empty());
}

#[test]
fn volume_converts_by_truncation() {
    // 0.65 ml * 10 pulses/ml = 6.5 -> 6 pulses
    let (mut ctl, _) = pump_loop(ScriptedSensor::triangle(100, 40, 4, 4), 2, 0);
    ctl.run_for_ml(0.65, false).unwrap();
    assert_eq!(ctl.diagnostics().pulse_count(), 6);
}

#[test]
fn counts_peaks_and_troughs_with_lag_corrected_times() {
    let (mut ctl, actuator) = pump_loop(ScriptedSensor::triangle(100, 40, 4, 3), 2, 0);
    ctl.run_for_pulses(4, true).unwrap();

    let d = ctl.diagnostics();
    // peaks at loop samples 3 and 19, troughs at 11 and 27
    assert_eq!(d.pulse_times_us, vec![3_000, 11_000, 19_000, 27_000]);
    assert_eq!(d.values_at_pulses, vec![140, 60, 140, 60]);
    assert_eq!(d.baseline, 100);
    assert_eq!(actuator.commands(), vec![true, false]);

    // run ends on the sample confirming the last trough
    assert_eq!(d.full_shape.len(), 30);
    assert_eq!(d.is_pulse.len(), 30);
    let flagged: Vec<usize> = (0..d.is_pulse.len()).filter(|&i| d.is_pulse[i]).collect();
    assert_eq!(flagged, vec![3, 11, 19, 27]);
    assert_eq!(d.full_shape[3], 40);
    assert_eq!(d.full_shape[11], -40);

    assert_eq!(d.average_interval_us(), 8_000.0);
    assert_eq!(d.interval_std_dev_us(), 0.0);
    assert_eq!(d.average_amplitude(), 80.0);
    assert_eq!(ctl.approx_samples_per_pulse(), 30 / 4);
}

#[test]
fn waveform_only_recorded_on_request() {
    let (mut ctl, _) = pump_loop(ScriptedSensor::triangle(100, 40, 4, 2), 2, 0);
    ctl.run_for_pulses(2, false).unwrap();
    assert_eq!(ctl.diagnostics().pulse_count(), 2);
    assert!(!ctl.diagnostics().has_full_shape());
    assert!(ctl.diagnostics().summary().waveform.is_none());
}

#[test]
fn baseline_is_seeded_then_replaced_by_loop_mean() {
    // seed read of 0, but the loop oscillates around 100
    let mut script = vec![0];
    script.extend(triangle_wave(100, 40, 4, 4));
    let (mut ctl, _) = pump_loop(ScriptedSensor::new(script), 2, 0);
    assert_eq!(ctl.baseline(), None);

    ctl.run_for_pulses(2, false).unwrap();
    assert_eq!(ctl.diagnostics().baseline, 0);
    // 14 loop samples: deviations sum to +10 over 14 -> integer mean 100
    assert_eq!(ctl.baseline(), Some(100));

    // the next run keeps the recalibrated value instead of its first reading
    ctl.run_for_pulses(2, false).unwrap();
    assert_eq!(ctl.diagnostics().baseline, 100);
}

#[test]
fn max_runtime_aborts_and_skips_recalibration() {
    let (mut ctl, actuator) = pump_loop(ScriptedSensor::new([500]), 2, 50);
    let err = ctl.run_for_pulses(3, true).unwrap_err();
    assert_eq!(err, PumpError::Abort(AbortReason::MaxRuntime));
    assert_eq!(actuator.commands(), vec![true, false]);
    assert_eq!(ctl.approx_samples_per_pulse(), 0);
    // seeded from the first reading, never recomputed
    assert_eq!(ctl.baseline(), Some(500));
    // 50 ms at 1 ms per sample
    assert_eq!(ctl.diagnostics().full_shape.len(), 50);
    assert_eq!(ctl.diagnostics().pulse_count(), 0);
}

#[test]
fn sensor_failure_mid_run_disables_pump() {
    let sensor = ScriptedSensor::triangle(100, 40, 4, 3).failing_after(10);
    let (mut ctl, actuator) = pump_loop(sensor, 2, 0);
    let err = ctl.run_for_pulses(4, false).unwrap_err();
    assert!(matches!(err, PumpError::Hardware(ref m) if m.contains("unplugged")));
    assert_eq!(actuator.commands(), vec![true, false]);
    // the first peak (sample 3, confirmed at 5) was recorded before the fault
    assert_eq!(ctl.diagnostics().pulse_count(), 1);
}

#[test]
fn enable_failure_aborts_before_sampling() {
    let actuator = RecordingActuator::failing_enable();
    let mut ctl = DosingControlLoop::new(
        actuator.clone(),
        ScriptedSensor::new([100]),
        Arc::new(ManualClock::new()),
        PumpCfg::default(),
        SamplingCfg::default(),
        SafetyCfg::default(),
    );
    let err = ctl.run_for_pulses(3, false).unwrap_err();
    assert!(matches!(err, PumpError::Hardware(_)));
    assert_eq!(actuator.commands(), vec![false]);
}

#[test]
fn begin_commands_pump_off() {
    let (mut ctl, actuator) = pump_loop(ScriptedSensor::new([100]), 2, 0);
    ctl.begin().unwrap();
    assert_eq!(actuator.commands(), vec![false]);
}

#[test]
fn clear_diagnostics_keeps_baseline() {
    let (mut ctl, _) = pump_loop(ScriptedSensor::triangle(100, 40, 4, 2), 2, 0);
    ctl.run_for_pulses(2, true).unwrap();
    ctl.clear_diagnostics();
    assert_eq!(ctl.diagnostics().pulse_count(), 0);
    assert!(!ctl.diagnostics().has_full_shape());
    assert_eq!(ctl.diagnostics().baseline, 100);
}
