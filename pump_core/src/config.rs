//! Configuration types for the pump engine.
//!
//! These are the runtime configuration structs used by `DosingControlLoop`
//! and `AsyncDosingTask`. They are separate from the TOML-deserialized config
//! in `pump_config`.

use std::time::Duration;

/// Pump and detector parameters.
#[derive(Debug, Clone)]
pub struct PumpCfg {
    /// Lookahead window L (detectors keep 2L+1 samples). Must be >= 1.
    pub lookahead: usize,
    /// Calibrated pulses per millilitre.
    pub pulses_per_ml: f32,
    /// Initial samples-per-pulse estimate, used only to pre-size buffers (0 = unknown).
    pub approx_samples_per_pulse: u32,
}

impl Default for PumpCfg {
    fn default() -> Self {
        Self {
            lookahead: 10,
            pulses_per_ml: 10.0,
            approx_samples_per_pulse: 0,
        }
    }
}

/// Sampling cadence.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Sensor sampling period in microseconds.
    pub period_us: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self { period_us: 2_000 }
    }
}

impl SamplingCfg {
    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }
}

/// Safety limits for a single run.
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Hard cap on a single run in milliseconds. 0 disables the cap.
    pub max_run_ms: u64,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self { max_run_ms: 60_000 }
    }
}

/// Bounded wait used by `AsyncDosingTask::stop`.
#[derive(Debug, Clone)]
pub struct StopCfg {
    /// Time allowed for cooperative exit before forced termination.
    pub timeout_ms: u64,
    /// Poll interval while waiting.
    pub poll_ms: u64,
}

impl Default for StopCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 1_000,
            poll_ms: 5,
        }
    }
}

impl StopCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}
