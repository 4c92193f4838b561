use std::sync::Arc;
use std::time::{Duration, Instant};

use pump_core::mocks::{FailingSpawner, RecordingActuator, ScriptedSensor, StuckSpawner};
use pump_core::{
    AbortReason, AsyncDosingTask, DosingControlLoop, PumpCfg, PumpError, SafetyCfg, SamplingCfg,
    StopCfg, StopOutcome, TaskState,
};
use pump_traits::clock::test_clock::ManualClock;
use pump_traits::{Clock, MonotonicClock, Spawner, ThreadSpawner};

type Ctl = DosingControlLoop<RecordingActuator, ScriptedSensor>;

fn control(sensor: ScriptedSensor, clock: Arc<dyn Clock + Send + Sync>) -> (Ctl, RecordingActuator) {
    let actuator = RecordingActuator::new();
    let ctl = DosingControlLoop::new(
        actuator.clone(),
        sensor,
        clock,
        PumpCfg {
            lookahead: 2,
            pulses_per_ml: 10.0,
            approx_samples_per_pulse: 0,
        },
        SamplingCfg { period_us: 1_000 },
        SafetyCfg { max_run_ms: 0 },
    );
    (ctl, actuator)
}

fn stop_cfg() -> StopCfg {
    StopCfg {
        timeout_ms: 500,
        poll_ms: 2,
    }
}

// Flat signal on a real clock: the run never reaches its target on its own.
fn endless<W: Spawner>(spawner: W) -> (AsyncDosingTask<RecordingActuator, ScriptedSensor, W>, RecordingActuator)
where
    W::Handle: 'static,
{
    let (ctl, actuator) = control(ScriptedSensor::new([100]), Arc::new(MonotonicClock::new()));
    (AsyncDosingTask::new(ctl, spawner, stop_cfg()), actuator)
}

fn quick() -> (AsyncDosingTask<RecordingActuator, ScriptedSensor>, RecordingActuator) {
    let (ctl, actuator) = control(
        ScriptedSensor::triangle(100, 40, 4, 3),
        Arc::new(ManualClock::new()),
    );
    (AsyncDosingTask::new(ctl, ThreadSpawner::new(), stop_cfg()), actuator)
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let (task, actuator) = quick();
    assert_eq!(task.stop(), StopOutcome::Idle);
    assert_eq!(task.state(), TaskState::Idle);
    assert!(task.is_finished());
    assert!(actuator.commands().is_empty());
}

#[test]
fn background_run_finishes_and_exposes_diagnostics() {
    let (task, actuator) = quick();
    task.start_for_pulses(4, true, false).unwrap();
    assert!(task.wait(Duration::from_secs(5)), "worker did not finish");
    assert!(task.is_finished());
    assert_eq!(task.last_result(), Some(Ok(())));

    let d = task.diagnostics().expect("diagnostics once finished");
    assert_eq!(d.pulse_times_us, vec![3_000, 11_000, 19_000, 27_000]);
    assert!(d.has_full_shape());
    assert_eq!(actuator.commands(), vec![true, false]);
}

#[test]
fn start_while_running_is_busy() {
    let (task, _) = endless(ThreadSpawner::new());
    task.start_for_pulses(3, false, false).unwrap();
    assert!(task.is_running());
    assert_eq!(task.state(), TaskState::Running);
    assert_eq!(task.start_for_pulses(3, false, false), Err(PumpError::Busy));
    assert_eq!(task.start_for_ml(2.0, false, true), Err(PumpError::Busy));
    assert!(task.diagnostics().is_none());
    assert_eq!(task.stop(), StopOutcome::Cooperative);
}

#[test]
fn cooperative_stop_within_timeout() {
    let (task, actuator) = endless(ThreadSpawner::new());
    task.start_for_pulses(3, false, false).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let t0 = Instant::now();
    assert_eq!(task.stop(), StopOutcome::Cooperative);
    assert!(t0.elapsed() < Duration::from_millis(500 + 250));
    assert!(!task.is_running());
    assert_eq!(task.state(), TaskState::Idle);
    assert_eq!(
        task.last_result(),
        Some(Err(PumpError::Abort(AbortReason::Cancelled)))
    );
    // the worker shut the pump off on its way out
    assert_eq!(actuator.commands(), vec![true, false]);

    // and a fresh run can start afterwards
    task.start_for_pulses(3, false, false).unwrap();
    assert_eq!(task.stop(), StopOutcome::Cooperative);
}

#[test]
fn spawn_failure_rolls_back_to_idle() {
    let (task, actuator) = endless(FailingSpawner);
    let err = task.start_for_pulses(3, false, false).unwrap_err();
    assert!(matches!(err, PumpError::Spawn(_)));
    assert!(!task.is_running());
    assert_eq!(task.state(), TaskState::Idle);
    assert!(actuator.commands().is_empty());
    assert_eq!(task.last_result(), None);
}

#[test]
fn unresponsive_worker_is_terminated() {
    let spawner = StuckSpawner::default();
    let (ctl, _) = control(ScriptedSensor::new([100]), Arc::new(ManualClock::new()));
    let task = AsyncDosingTask::new(
        ctl,
        spawner.clone(),
        StopCfg {
            timeout_ms: 20,
            poll_ms: 5,
        },
    );
    task.start_for_pulses(3, false, false).unwrap();
    assert!(task.is_running());

    assert_eq!(task.stop(), StopOutcome::Forced);
    assert_eq!(spawner.terminations(), 1);
    assert!(!task.is_running());
    assert_eq!(
        task.last_result(),
        Some(Err(PumpError::Abort(AbortReason::Cancelled)))
    );
    // the abandoned job never held the loop, so the pump is usable again
    task.start_for_pulses(3, false, false).unwrap();
}

#[test]
fn blocking_start_runs_on_caller() {
    let (task, actuator) = quick();
    task.start_for_pulses(4, false, true).unwrap();
    assert!(task.is_finished());
    assert_eq!(task.diagnostics().map(|d| d.pulse_count()), Some(4));
    assert_eq!(actuator.commands(), vec![true, false]);
}

#[test]
fn invalid_requests_leave_task_idle() {
    let (task, actuator) = quick();
    assert!(matches!(
        task.start_for_pulses(0, false, false),
        Err(PumpError::InvalidRequest(_))
    ));
    assert!(matches!(
        task.start_for_ml(0.2, false, false),
        Err(PumpError::InvalidRequest(_))
    ));
    assert!(!task.is_running());
    assert!(actuator.commands().is_empty());
}

#[test]
fn with_control_refuses_while_running() {
    let (task, _) = endless(ThreadSpawner::new());
    assert_eq!(task.with_control(|c| c.baseline()), Ok(None));
    task.start_for_pulses(3, false, false).unwrap();
    assert_eq!(task.with_control(|c| c.baseline()), Err(PumpError::Busy));
    task.stop();
    assert_eq!(task.with_control(|c| c.baseline()), Ok(Some(100)));
}
