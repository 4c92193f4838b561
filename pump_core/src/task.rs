//! Background execution of a `DosingControlLoop` (`AsyncDosingTask`).
//!
//! The loop is shared between the issuing context and at most one worker.
//! Lifecycle: `Idle -> Running` on start, `Running -> Idle` when the worker
//! returns, `Running -> Stopping -> Idle` on `stop()`.
//!
//! Shared state:
//! - `running` is claimed with a compare-exchange on start and released by
//!   whichever context ends the run.
//! - each run gets a fresh abort flag; the worker polls it once per sampling
//!   tick.
//! - the worker slot is only touched under its mutex. The lock is held across
//!   spawn-and-store, and a worker only clears the slot if it still carries its
//!   own generation.
//! - the worker signals exit on a bounded channel that `stop()` waits on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use pump_traits::{Actuator, Sensor, Spawner, ThreadSpawner, WorkerHandle};

use crate::config::StopCfg;
use crate::control::{DosingControlLoop, pulses_for_volume};
use crate::diagnostics::Diagnostics;
use crate::error::{AbortReason, PumpError};

/// Name given to worker contexts.
pub const WORKER_NAME: &str = "pump-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Stopping,
}

/// How `stop()` ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    Idle,
    /// The worker observed the abort flag and exited within the timeout.
    Cooperative,
    /// The worker did not exit in time and was terminated. Actuator state is
    /// unverified; the caller must command the pump off independently.
    Forced,
}

struct Worker<H> {
    generation: u64,
    handle: H,
}

struct Shared<H> {
    running: AtomicBool,
    stopping: AtomicBool,
    generation: AtomicU64,
    slot: Mutex<Option<Worker<H>>>,
    abort: Mutex<Arc<AtomicBool>>,
    last_result: Mutex<Option<Result<(), PumpError>>>,
    done_tx: xch::Sender<u64>,
    done_rx: xch::Receiver<u64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AsyncDosingTask<A, S, W: Spawner = ThreadSpawner> {
    control: Arc<Mutex<DosingControlLoop<A, S>>>,
    spawner: W,
    stop_cfg: StopCfg,
    pulses_per_ml: f32,
    shared: Arc<Shared<W::Handle>>,
}

impl<A, S, W: Spawner> core::fmt::Debug for AsyncDosingTask<A, S, W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncDosingTask")
            .field("running", &self.shared.running.load(Ordering::Relaxed))
            .field("stopping", &self.shared.stopping.load(Ordering::Relaxed))
            .field("stop_cfg", &self.stop_cfg)
            .finish_non_exhaustive()
    }
}

impl<A, S, W> AsyncDosingTask<A, S, W>
where
    A: Actuator + Send + 'static,
    S: Sensor + Send + 'static,
    W: Spawner,
    W::Handle: 'static,
{
    pub fn new(control: DosingControlLoop<A, S>, spawner: W, stop_cfg: StopCfg) -> Self {
        let (done_tx, done_rx) = xch::bounded(1);
        let pulses_per_ml = control.pulses_per_ml();
        Self {
            control: Arc::new(Mutex::new(control)),
            spawner,
            stop_cfg,
            pulses_per_ml,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                slot: Mutex::new(None),
                abort: Mutex::new(Arc::new(AtomicBool::new(false))),
                last_result: Mutex::new(None),
                done_tx,
                done_rx,
            }),
        }
    }

    /// Start dispensing `ml` millilitres. With `blocking` the run executes on
    /// the caller and its result is returned.
    pub fn start_for_ml(&self, ml: f32, full_diagnostics: bool, blocking: bool) -> Result<(), PumpError> {
        let pulses = pulses_for_volume(ml, self.pulses_per_ml)?;
        self.start_for_pulses(pulses, full_diagnostics, blocking)
    }

    pub fn start_for_pulses(
        &self,
        target: u32,
        full_diagnostics: bool,
        blocking: bool,
    ) -> Result<(), PumpError> {
        if target == 0 {
            return Err(PumpError::InvalidRequest("pulse target must be at least 1"));
        }
        let shared = &self.shared;
        if shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PumpError::Busy);
        }
        // a worker abandoned by a forced stop may still own the loop
        match self.control.try_lock() {
            Ok(_) | Err(TryLockError::Poisoned(_)) => {}
            Err(TryLockError::WouldBlock) => {
                shared.running.store(false, Ordering::Release);
                return Err(PumpError::Busy);
            }
        }
        shared.stopping.store(false, Ordering::Release);
        let abort = Arc::new(AtomicBool::new(false));
        *lock(&shared.abort) = abort.clone();
        while shared.done_rx.try_recv().is_ok() {}

        if blocking {
            let result = lock(&self.control).run_with_cancel(target, full_diagnostics, &abort);
            *lock(&shared.last_result) = Some(result.clone());
            shared.stopping.store(false, Ordering::Release);
            shared.running.store(false, Ordering::Release);
            return result;
        }

        let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut slot = lock(&shared.slot);
        let job = worker_job(
            self.control.clone(),
            shared.clone(),
            abort,
            generation,
            target,
            full_diagnostics,
        );
        match self.spawner.spawn(WORKER_NAME, job) {
            Ok(handle) => {
                *slot = Some(Worker { generation, handle });
                tracing::debug!(generation, target, "pump worker spawned");
                Ok(())
            }
            Err(e) => {
                drop(slot);
                shared.running.store(false, Ordering::Release);
                tracing::warn!(error = %e, "pump worker spawn failed");
                Err(PumpError::Spawn(e.to_string()))
            }
        }
    }

    /// Request cancellation and wait (bounded) for the run to end.
    pub fn stop(&self) -> StopOutcome {
        let shared = &self.shared;
        if !shared.running.load(Ordering::Acquire) {
            return StopOutcome::Idle;
        }
        shared.stopping.store(true, Ordering::Release);
        lock(&shared.abort).store(true, Ordering::Release);

        let deadline = Instant::now() + self.stop_cfg.timeout();
        let poll = self.stop_cfg.poll();
        loop {
            if !shared.running.load(Ordering::Acquire) {
                shared.stopping.store(false, Ordering::Release);
                return StopOutcome::Cooperative;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let _ = shared.done_rx.recv_timeout(poll.min(deadline - now));
        }

        let mut slot = lock(&shared.slot);
        let outcome = match slot.take() {
            // blocking run on another context: only that context can end it
            None if shared.running.load(Ordering::Acquire) => {
                tracing::warn!(
                    timeout_ms = self.stop_cfg.timeout_ms,
                    "blocking pump run did not observe stop in time; actuator state unverified"
                );
                return StopOutcome::Forced;
            }
            None => StopOutcome::Cooperative,
            Some(worker) if worker.handle.is_finished() => StopOutcome::Cooperative,
            Some(worker) => {
                worker.handle.terminate();
                *lock(&shared.last_result) =
                    Some(Err(PumpError::Abort(AbortReason::Cancelled)));
                tracing::warn!(
                    generation = worker.generation,
                    timeout_ms = self.stop_cfg.timeout_ms,
                    "pump worker terminated; actuator state unverified, command it off"
                );
                StopOutcome::Forced
            }
        };
        shared.running.store(false, Ordering::Release);
        shared.stopping.store(false, Ordering::Release);
        drop(slot);
        outcome
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_running()
    }

    pub fn state(&self) -> TaskState {
        if !self.is_running() {
            TaskState::Idle
        } else if self.shared.stopping.load(Ordering::Acquire) {
            TaskState::Stopping
        } else {
            TaskState::Running
        }
    }

    /// Snapshot of the last run's diagnostics; `None` while a run holds the loop.
    pub fn diagnostics(&self) -> Option<Diagnostics> {
        if self.is_running() {
            return None;
        }
        match self.control.try_lock() {
            Ok(ctl) => Some(ctl.diagnostics().clone()),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner().diagnostics().clone()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Block until the task is idle or `timeout` elapses. Returns true when idle.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let _ = self
                .shared
                .done_rx
                .recv_timeout(self.stop_cfg.poll().min(deadline - now));
        }
        true
    }

    /// Outcome of the most recent run, once it has finished.
    pub fn last_result(&self) -> Option<Result<(), PumpError>> {
        lock(&self.shared.last_result).clone()
    }

    /// Access the loop while idle (baseline, self-check reads, ...).
    pub fn with_control<R>(
        &self,
        f: impl FnOnce(&mut DosingControlLoop<A, S>) -> R,
    ) -> Result<R, PumpError> {
        if self.is_running() {
            return Err(PumpError::Busy);
        }
        match self.control.try_lock() {
            Ok(mut ctl) => Ok(f(&mut ctl)),
            Err(TryLockError::Poisoned(p)) => Ok(f(&mut p.into_inner())),
            Err(TryLockError::WouldBlock) => Err(PumpError::Busy),
        }
    }
}

impl<A, S, W: Spawner> Drop for AsyncDosingTask<A, S, W> {
    fn drop(&mut self) {
        // leave no worker driving the pump behind an unreachable handle
        if self.shared.running.load(Ordering::Acquire) {
            lock(&self.shared.abort).store(true, Ordering::Release);
        }
    }
}

fn worker_job<A, S, H>(
    control: Arc<Mutex<DosingControlLoop<A, S>>>,
    shared: Arc<Shared<H>>,
    abort: Arc<AtomicBool>,
    generation: u64,
    target: u32,
    full_diagnostics: bool,
) -> pump_traits::Job
where
    A: Actuator + Send + 'static,
    S: Sensor + Send + 'static,
    H: WorkerHandle + 'static,
{
    let dispatch = tracing::dispatcher::get_default(Clone::clone);
    Box::new(move || {
        let result = tracing::dispatcher::with_default(&dispatch, || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                lock(&control).run_with_cancel(target, full_diagnostics, &abort)
            }))
            .unwrap_or_else(|_| Err(PumpError::Hardware("pump worker panicked".into())))
        });
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::debug!(generation, ok = result.is_ok(), "pump worker exiting");
        });
        {
            let mut slot = lock(&shared.slot);
            if slot.as_ref().is_some_and(|w| w.generation == generation) {
                *lock(&shared.last_result) = Some(result);
                *slot = None;
                shared.stopping.store(false, Ordering::Release);
                shared.running.store(false, Ordering::Release);
            }
        }
        let _ = shared.done_tx.try_send(generation);
    })
}
