//! Type-state builder for the blocking and background pumps.
//!
//! `build()` and `build_async()` become available once both an actuator and a
//! sensor have been supplied. `try_build()` is always available and reports
//! missing pieces at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use pump_traits::clock::{Clock, MonotonicClock};
use pump_traits::{Actuator, Sensor, Spawner, ThreadSpawner};

use crate::config::{PumpCfg, SafetyCfg, SamplingCfg, StopCfg};
use crate::control::DosingControlLoop;
use crate::error::{BuildError, Result};
use crate::task::AsyncDosingTask;

/// Boxed actuator stored by the builder.
pub type BoxedActuator = Box<dyn Actuator + Send>;
/// Boxed sensor stored by the builder.
pub type BoxedSensor = Box<dyn Sensor + Send>;

/// Blocking pump produced by `PumpBuilder::build`.
pub type BlockingPump = DosingControlLoop<BoxedActuator, BoxedSensor>;
/// Background pump produced by `PumpBuilder::build_async`.
pub type BackgroundPump<W = ThreadSpawner> = AsyncDosingTask<BoxedActuator, BoxedSensor, W>;

/// Upper bound on the lookahead window.
pub const MAX_LOOKAHEAD: usize = 1_000;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct PumpBuilder<A, S, W = ThreadSpawner> {
    actuator: Option<BoxedActuator>,
    sensor: Option<BoxedSensor>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    pump: Option<PumpCfg>,
    sampling: Option<SamplingCfg>,
    safety: Option<SafetyCfg>,
    stop: Option<StopCfg>,
    spawner: W,
    _a: PhantomData<A>,
    _s: PhantomData<S>,
}

impl Default for PumpBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            actuator: None,
            sensor: None,
            clock: None,
            pump: None,
            sampling: None,
            safety: None,
            stop: None,
            spawner: ThreadSpawner::default(),
            _a: PhantomData,
            _s: PhantomData,
        }
    }
}

impl PumpBuilder<Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate(pump: &PumpCfg, sampling: &SamplingCfg) -> Result<()> {
    if pump.lookahead == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "lookahead must be >= 1",
        )));
    }
    if pump.lookahead > MAX_LOOKAHEAD {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "lookahead must be <= 1000",
        )));
    }
    if !pump.pulses_per_ml.is_finite() || pump.pulses_per_ml <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "pulses_per_ml must be finite and > 0",
        )));
    }
    if sampling.period_us == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "period_us must be >= 1",
        )));
    }
    Ok(())
}

impl<A, S, W> PumpBuilder<A, S, W> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<BlockingPump> {
        self.into_parts().map(|(control, _, _)| control)
    }

    fn into_parts(self) -> Result<(BlockingPump, StopCfg, W)> {
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let pump = self.pump.unwrap_or_default();
        let sampling = self.sampling.unwrap_or_default();
        validate(&pump, &sampling)?;

        let stop = self.stop.unwrap_or_default();
        if stop.timeout_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "stop timeout_ms must be >= 1",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let control = DosingControlLoop::new(
            actuator,
            sensor,
            clock,
            pump,
            sampling,
            self.safety.unwrap_or_default(),
        );
        Ok((control, stop, self.spawner))
    }
}

/// Chainable setters that do not affect type-state.
impl<A, S, W> PumpBuilder<A, S, W> {
    pub fn with_pump(mut self, pump: PumpCfg) -> Self {
        self.pump = Some(pump);
        self
    }
    pub fn with_sampling(mut self, sampling: SamplingCfg) -> Self {
        self.sampling = Some(sampling);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    pub fn with_stop(mut self, stop: StopCfg) -> Self {
        self.stop = Some(stop);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the worker spawner used by `build_async`.
    pub fn with_spawner<W2: Spawner>(self, spawner: W2) -> PumpBuilder<A, S, W2> {
        PumpBuilder {
            actuator: self.actuator,
            sensor: self.sensor,
            clock: self.clock,
            pump: self.pump,
            sampling: self.sampling,
            safety: self.safety,
            stop: self.stop,
            spawner,
            _a: PhantomData,
            _s: PhantomData,
        }
    }
}

// Setters that advance type-state
impl<S, W> PumpBuilder<Missing, S, W> {
    pub fn with_actuator(
        self,
        actuator: impl Actuator + Send + 'static,
    ) -> PumpBuilder<Set, S, W> {
        PumpBuilder {
            actuator: Some(Box::new(actuator)),
            sensor: self.sensor,
            clock: self.clock,
            pump: self.pump,
            sampling: self.sampling,
            safety: self.safety,
            stop: self.stop,
            spawner: self.spawner,
            _a: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<A, W> PumpBuilder<A, Missing, W> {
    pub fn with_sensor(self, sensor: impl Sensor + Send + 'static) -> PumpBuilder<A, Set, W> {
        PumpBuilder {
            actuator: self.actuator,
            sensor: Some(Box::new(sensor)),
            clock: self.clock,
            pump: self.pump,
            sampling: self.sampling,
            safety: self.safety,
            stop: self.stop,
            spawner: self.spawner,
            _a: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<W: Spawner> PumpBuilder<Set, Set, W>
where
    W::Handle: 'static,
{
    /// Validate and build the blocking pump.
    pub fn build(self) -> Result<BlockingPump> {
        self.try_build()
    }

    /// Validate and build the background pump.
    pub fn build_async(self) -> Result<BackgroundPump<W>> {
        let (control, stop, spawner) = self.into_parts()?;
        Ok(AsyncDosingTask::new(control, spawner, stop))
    }
}
