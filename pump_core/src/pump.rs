//! Common capability interface over the blocking and background pumps.

use pump_traits::{Actuator, Sensor, Spawner};

use crate::control::DosingControlLoop;
use crate::diagnostics::Diagnostics;
use crate::error::PumpError;
use crate::task::{AsyncDosingTask, StopOutcome};

/// A pump that dispenses by counting pulses.
///
/// `DosingControlLoop` runs each request to completion on the caller.
/// `AsyncDosingTask` starts the request on a worker and returns immediately.
pub trait Pump {
    fn run_for_pulses(&mut self, pulses: u32, full_diagnostics: bool) -> Result<(), PumpError>;
    fn run_for_ml(&mut self, ml: f32, full_diagnostics: bool) -> Result<(), PumpError>;
    fn stop(&mut self) -> StopOutcome;
    fn is_busy(&self) -> bool;
    fn is_finished(&self) -> bool {
        !self.is_busy()
    }
    /// Diagnostics of the last run, when available.
    fn diagnostics(&self) -> Option<Diagnostics>;
}

impl<A: Actuator, S: Sensor> Pump for DosingControlLoop<A, S> {
    fn run_for_pulses(&mut self, pulses: u32, full_diagnostics: bool) -> Result<(), PumpError> {
        Self::run_for_pulses(self, pulses, full_diagnostics)
    }

    fn run_for_ml(&mut self, ml: f32, full_diagnostics: bool) -> Result<(), PumpError> {
        Self::run_for_ml(self, ml, full_diagnostics)
    }

    // runs complete before the caller regains control
    fn stop(&mut self) -> StopOutcome {
        StopOutcome::Idle
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn diagnostics(&self) -> Option<Diagnostics> {
        Some(Self::diagnostics(self).clone())
    }
}

impl<A, S, W> Pump for AsyncDosingTask<A, S, W>
where
    A: Actuator + Send + 'static,
    S: Sensor + Send + 'static,
    W: Spawner,
    W::Handle: 'static,
{
    fn run_for_pulses(&mut self, pulses: u32, full_diagnostics: bool) -> Result<(), PumpError> {
        self.start_for_pulses(pulses, full_diagnostics, false)
    }

    fn run_for_ml(&mut self, ml: f32, full_diagnostics: bool) -> Result<(), PumpError> {
        self.start_for_ml(ml, full_diagnostics, false)
    }

    fn stop(&mut self) -> StopOutcome {
        Self::stop(self)
    }

    fn is_busy(&self) -> bool {
        self.is_running()
    }

    fn is_finished(&self) -> bool {
        Self::is_finished(self)
    }

    fn diagnostics(&self) -> Option<Diagnostics> {
        Self::diagnostics(self)
    }
}
