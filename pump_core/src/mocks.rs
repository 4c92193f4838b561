//! Test and helper mocks for pump_core.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use pump_traits::{Actuator, Job, Sensor, Spawner, WorkerHandle};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sensor that replays a fixed script, then repeats its last value.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    samples: VecDeque<i32>,
    last: i32,
    fail_after: Option<usize>,
    served: usize,
}

impl ScriptedSensor {
    pub fn new(samples: impl IntoIterator<Item = i32>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Baseline read followed by `cycles` triangle waves (see `triangle_wave`).
    pub fn triangle(baseline: i32, amplitude: i32, half: i32, cycles: usize) -> Self {
        let mut xs = vec![baseline];
        xs.extend(triangle_wave(baseline, amplitude, half, cycles));
        Self::new(xs)
    }

    /// Fail every read after `n` successful ones.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> Result<i32, BoxError> {
        if self.fail_after.is_some_and(|n| self.served >= n) {
            return Err(Box::new(io::Error::other("sensor unplugged")));
        }
        self.served += 1;
        if let Some(v) = self.samples.pop_front() {
            self.last = v;
        }
        Ok(self.last)
    }
}

/// `cycles` periods of a triangle wave around `baseline`, `4 * half` samples
/// each. Per period the peak sits at index `half - 1` and the trough at
/// `3 * half - 1`; the wave starts one step above and ends on `baseline`.
pub fn triangle_wave(baseline: i32, amplitude: i32, half: i32, cycles: usize) -> Vec<i32> {
    let half = half.max(1);
    let mut xs = Vec::with_capacity(cycles * 4 * half as usize);
    for _ in 0..cycles {
        // up to the peak, down through baseline to the trough, back up
        for k in 1..=half {
            xs.push(baseline + amplitude * k / half);
        }
        for k in (-half..half).rev() {
            xs.push(baseline + amplitude * k / half);
        }
        for k in (-half + 1)..=0 {
            xs.push(baseline + amplitude * k / half);
        }
    }
    xs
}

/// Actuator that records every command. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: Arc<Mutex<Vec<bool>>>,
    fail_enable: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_enable() -> Self {
        Self {
            fail_enable: true,
            ..Self::default()
        }
    }

    /// Commands so far; true = enable.
    pub fn commands(&self) -> Vec<bool> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.commands().last().copied().unwrap_or(false)
    }
}

impl Actuator for RecordingActuator {
    fn enable(&mut self) -> Result<(), BoxError> {
        if self.fail_enable {
            return Err(Box::new(io::Error::other("enable line stuck")));
        }
        if let Ok(mut l) = self.log.lock() {
            l.push(true);
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        if let Ok(mut l) = self.log.lock() {
            l.push(false);
        }
        Ok(())
    }
}

/// Spawner whose spawns always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSpawner;

/// Handle type of `FailingSpawner`; never constructed.
#[derive(Debug)]
pub struct NeverHandle;

impl WorkerHandle for NeverHandle {
    fn is_finished(&self) -> bool {
        true
    }
    fn terminate(self) {}
}

impl Spawner for FailingSpawner {
    type Handle = NeverHandle;

    fn spawn(&self, _name: &str, _job: Job) -> io::Result<NeverHandle> {
        Err(io::Error::new(io::ErrorKind::OutOfMemory, "no worker slots"))
    }
}

/// Spawner that accepts a job but never runs it, so the worker never exits
/// on its own. Counts terminations.
#[derive(Debug, Default, Clone)]
pub struct StuckSpawner {
    terminated: Arc<AtomicU32>,
}

pub struct StuckHandle {
    terminated: Arc<AtomicU32>,
    _job: Job,
}

impl std::fmt::Debug for StuckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StuckHandle").finish_non_exhaustive()
    }
}

impl StuckSpawner {
    pub fn terminations(&self) -> u32 {
        self.terminated.load(Ordering::Acquire)
    }
}

impl WorkerHandle for StuckHandle {
    fn is_finished(&self) -> bool {
        false
    }
    fn terminate(self) {
        self.terminated.fetch_add(1, Ordering::AcqRel);
    }
}

impl Spawner for StuckSpawner {
    type Handle = StuckHandle;

    fn spawn(&self, _name: &str, job: Job) -> io::Result<StuckHandle> {
        Ok(StuckHandle {
            terminated: self.terminated.clone(),
            _job: job,
        })
    }
}
