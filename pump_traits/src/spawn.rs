//! Worker-context primitives: spawn, query, terminate.
//!
//! The background pump runs its sample loop on exactly one worker. These
//! traits keep the task wrapper independent of how that worker is created,
//! so tests can inject spawners that fail or never finish.

use std::io;
use std::thread::JoinHandle;

/// Boxed job executed on the worker context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a spawned worker.
pub trait WorkerHandle: Send {
    /// True once the job has returned.
    fn is_finished(&self) -> bool;

    /// Forcibly end the worker.
    ///
    /// Implementations that cannot preempt their worker (std threads) detach
    /// it instead; either way the caller must treat any hardware the job was
    /// driving as being in an unknown state.
    fn terminate(self);
}

/// Creates worker contexts.
pub trait Spawner: Send + Sync {
    type Handle: WorkerHandle;

    /// Spawn `job` on a new worker. Failure means nothing was started.
    fn spawn(&self, name: &str, job: Job) -> io::Result<Self::Handle>;
}

/// Spawner backed by `std::thread::Builder`.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpawner {
    stack_size: usize,
}

impl ThreadSpawner {
    /// Default worker stack size in bytes.
    pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

    pub fn new() -> Self {
        Self {
            stack_size: Self::DEFAULT_STACK_SIZE,
        }
    }

    pub fn with_stack_size(stack_size: usize) -> Self {
        Self { stack_size }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner for ThreadSpawner {
    type Handle = ThreadHandle;

    fn spawn(&self, name: &str, job: Job) -> io::Result<ThreadHandle> {
        let inner = std::thread::Builder::new()
            .name(name.to_string())
            .stack_size(self.stack_size)
            .spawn(job)?;
        Ok(ThreadHandle { inner })
    }
}

/// Worker handle for a std thread.
#[derive(Debug)]
pub struct ThreadHandle {
    inner: JoinHandle<()>,
}

impl ThreadHandle {
    /// Block until the worker returns. Returns false if it panicked.
    pub fn join(self) -> bool {
        self.inner.join().is_ok()
    }
}

impl WorkerHandle for ThreadHandle {
    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn terminate(self) {
        // std threads cannot be killed; dropping the JoinHandle detaches.
        drop(self.inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn thread_spawner_runs_job() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = ThreadSpawner::new()
            .spawn(
                "unit-worker",
                Box::new(move || flag.store(true, Ordering::SeqCst)),
            )
            .unwrap();
        assert!(handle.join());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn is_finished_tracks_job() {
        let release = Arc::new(AtomicBool::new(false));
        let gate = release.clone();
        let handle = ThreadSpawner::new()
            .spawn(
                "unit-worker",
                Box::new(move || {
                    while !gate.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }),
            )
            .unwrap();
        assert!(!handle.is_finished());
        release.store(true, Ordering::SeqCst);
        assert!(handle.join());
    }
}
