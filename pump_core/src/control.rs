//! The blocking dosing control loop (`DosingControlLoop`).
//!
//! One run enables the pump, samples the pulse sensor at a fixed period,
//! counts extrema reported by a peak and a trough detector until the target
//! is reached, then disables the pump and recalibrates the resting baseline
//! and the samples-per-pulse estimate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pump_traits::{Actuator, Clock, Sensor};

use crate::config::{PumpCfg, SafetyCfg, SamplingCfg};
use crate::detector::ExtremumDetector;
use crate::diagnostics::Diagnostics;
use crate::error::{AbortReason, PumpError};
use crate::util::{RESERVE_SLACK_PULSES, corrected_timestamp_us, waveform_reserve};

/// Minimum pulse count a volume request must exceed.
pub const MIN_PULSES_PER_REQUEST: f32 = 5.0;

pub struct DosingControlLoop<A, S> {
    pub(crate) actuator: A,
    pub(crate) sensor: S,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) pump: PumpCfg,
    pub(crate) sampling: SamplingCfg,
    pub(crate) safety: SafetyCfg,
    peak: ExtremumDetector<i32>,
    trough: ExtremumDetector<i32>,
    baseline: Option<i32>,
    samples_per_pulse: u32,
    diagnostics: Diagnostics,
}

impl<A, S> core::fmt::Debug for DosingControlLoop<A, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DosingControlLoop")
            .field("lookahead", &self.pump.lookahead)
            .field("pulses_per_ml", &self.pump.pulses_per_ml)
            .field("period_us", &self.sampling.period_us)
            .field("baseline", &self.baseline)
            .field("samples_per_pulse", &self.samples_per_pulse)
            .finish_non_exhaustive()
    }
}

// Running sums over one run's loop samples.
#[derive(Default)]
struct RunTotals {
    samples: u64,
    raw_sum: i64,
}

impl<A: Actuator, S: Sensor> DosingControlLoop<A, S> {
    /// Assemble a loop from parts. Prefer `PumpBuilder`, which validates the
    /// configuration first.
    pub fn new(
        actuator: A,
        sensor: S,
        clock: Arc<dyn Clock + Send + Sync>,
        pump: PumpCfg,
        sampling: SamplingCfg,
        safety: SafetyCfg,
    ) -> Self {
        let lookahead = pump.lookahead;
        let samples_per_pulse = pump.approx_samples_per_pulse;
        Self {
            actuator,
            sensor,
            clock,
            pump,
            sampling,
            safety,
            peak: ExtremumDetector::peak(lookahead),
            trough: ExtremumDetector::trough(lookahead),
            baseline: None,
            samples_per_pulse,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Drive the pump to a known off state.
    pub fn begin(&mut self) -> Result<(), PumpError> {
        self.actuator.disable().map_err(hw)
    }

    /// True when `ml` converts to more than the minimum pulse count.
    pub fn volume_supported(&self, ml: f32) -> bool {
        pulses_for_volume(ml, self.pump.pulses_per_ml).is_ok()
    }

    pub fn pulses_per_ml(&self) -> f32 {
        self.pump.pulses_per_ml
    }

    /// Samples per pulse measured by the last completed run (0 = unknown).
    pub fn approx_samples_per_pulse(&self) -> u32 {
        self.samples_per_pulse
    }

    /// Resting sensor level; `None` until the first run has seeded it.
    pub fn baseline(&self) -> Option<i32> {
        self.baseline
    }

    pub fn lookahead(&self) -> usize {
        self.pump.lookahead
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    /// Read the sensor once outside a run.
    pub fn read_sensor(&mut self) -> Result<i32, PumpError> {
        self.sensor.read().map_err(hw)
    }

    /// Dispense `ml` millilitres, converted to whole pulses (truncating).
    pub fn run_for_ml(&mut self, ml: f32, full_diagnostics: bool) -> Result<(), PumpError> {
        let pulses = self.pulses_for_ml(ml)?;
        self.run_for_pulses(pulses, full_diagnostics)
    }

    /// Run until `target` pulses have been detected.
    pub fn run_for_pulses(&mut self, target: u32, full_diagnostics: bool) -> Result<(), PumpError> {
        let never = AtomicBool::new(false);
        self.run_with_cancel(target, full_diagnostics, &never)
    }

    pub(crate) fn pulses_for_ml(&self, ml: f32) -> Result<u32, PumpError> {
        pulses_for_volume(ml, self.pump.pulses_per_ml)
    }

    /// Run loop shared with the background task; `cancel` is polled once per
    /// sampling tick.
    pub(crate) fn run_with_cancel(
        &mut self,
        target: u32,
        full_diagnostics: bool,
        cancel: &AtomicBool,
    ) -> Result<(), PumpError> {
        if target == 0 {
            return Err(PumpError::InvalidRequest("pulse target must be at least 1"));
        }
        let _span = tracing::info_span!("pump_run", target, full_diagnostics).entered();

        self.peak.clear();
        self.trough.clear();
        self.diagnostics.clear();

        let first = self.sensor.read().map_err(hw)?;
        let baseline = *self.baseline.get_or_insert(first);
        self.diagnostics.baseline = baseline;
        self.reserve(target, full_diagnostics);
        self.peak.prefill(baseline);
        self.trough.prefill(baseline);

        if let Err(e) = self.actuator.enable() {
            self.disable_best_effort("enable failure");
            return Err(hw(e));
        }
        tracing::info!(
            target,
            baseline,
            period_us = self.sampling.period_us,
            "pump run started"
        );

        let mut totals = RunTotals::default();
        match self.sample_until(target, full_diagnostics, baseline, cancel, &mut totals) {
            Ok(()) => self.finish(&totals),
            Err(e) => {
                self.disable_best_effort("run abort");
                tracing::info!(
                    error = %e,
                    pulses = self.diagnostics.pulse_count(),
                    samples = totals.samples,
                    "pump run aborted"
                );
                Err(e)
            }
        }
    }

    fn reserve(&mut self, target: u32, full_diagnostics: bool) {
        let pulses = (target as usize).saturating_add(RESERVE_SLACK_PULSES);
        self.diagnostics.pulse_times_us.reserve(pulses);
        self.diagnostics.values_at_pulses.reserve(pulses);
        if full_diagnostics {
            let samples = waveform_reserve(self.samples_per_pulse, target);
            self.diagnostics.full_shape.reserve(samples);
            self.diagnostics.is_pulse.reserve(samples);
        }
    }

    fn sample_until(
        &mut self,
        target: u32,
        full_diagnostics: bool,
        baseline: i32,
        cancel: &AtomicBool,
        totals: &mut RunTotals,
    ) -> Result<(), PumpError> {
        let period = Duration::from_micros(self.sampling.period_us);
        let lookahead = self.pump.lookahead;
        let epoch = self.clock.now();
        let mut remaining = target;

        while remaining > 0 {
            if cancel.load(Ordering::Acquire) {
                return Err(PumpError::Abort(AbortReason::Cancelled));
            }
            if self.safety.max_run_ms > 0 && self.clock.ms_since(epoch) >= self.safety.max_run_ms {
                return Err(PumpError::Abort(AbortReason::MaxRuntime));
            }

            let tick = self.clock.now();
            let now_us = self.clock.micros_since(epoch);
            let raw = self.sensor.read().map_err(hw)?;
            totals.samples += 1;
            totals.raw_sum += i64::from(raw);
            let relative = raw.saturating_sub(baseline);
            tracing::trace!(raw, relative, "sample");

            let at_peak = self.peak.add_sample(raw);
            let at_trough = self.trough.add_sample(raw);

            let shape_len = self.diagnostics.full_shape.len();
            if full_diagnostics {
                self.diagnostics.full_shape.push(relative);
                self.diagnostics.is_pulse.push(false);
            }

            let extremum = if at_peak {
                self.peak.center_value()
            } else if at_trough {
                self.trough.center_value()
            } else {
                None
            };
            if let Some(value) = extremum {
                let at_us = corrected_timestamp_us(now_us, lookahead, self.sampling.period_us);
                self.diagnostics.pulse_times_us.push(at_us);
                self.diagnostics.values_at_pulses.push(value);
                remaining -= 1;
                if full_diagnostics
                    && let Some(center) = shape_len.checked_sub(lookahead)
                    && let Some(flag) = self.diagnostics.is_pulse.get_mut(center)
                {
                    *flag = true;
                }
                tracing::debug!(at_us, value, peak = at_peak, remaining, "pulse");
            }

            let elapsed = self.clock.now().saturating_duration_since(tick);
            self.clock.sleep(period.saturating_sub(elapsed));
        }
        Ok(())
    }

    fn finish(&mut self, totals: &RunTotals) -> Result<(), PumpError> {
        self.actuator.disable().map_err(hw)?;
        let pulses = self.diagnostics.pulse_count() as u64;
        if pulses > 0 {
            self.samples_per_pulse = u32::try_from(totals.samples / pulses).unwrap_or(u32::MAX);
        }
        if totals.samples > 0 {
            let mean = totals.raw_sum / totals.samples as i64;
            self.baseline = Some(i32::try_from(mean).unwrap_or(self.diagnostics.baseline));
        }
        tracing::info!(
            pulses,
            samples = totals.samples,
            samples_per_pulse = self.samples_per_pulse,
            baseline = ?self.baseline,
            "pump run complete"
        );
        Ok(())
    }

    fn disable_best_effort(&mut self, context: &'static str) {
        if let Err(e) = self.actuator.disable() {
            tracing::warn!(error = %e, context, "actuator disable failed");
        }
    }
}

/// Convert a volume into whole pulses (truncating). Rejects requests that do
/// not exceed `MIN_PULSES_PER_REQUEST` or are not finite.
pub fn pulses_for_volume(ml: f32, pulses_per_ml: f32) -> Result<u32, PumpError> {
    let pulses = ml * pulses_per_ml;
    if !pulses.is_finite() || pulses <= MIN_PULSES_PER_REQUEST {
        return Err(PumpError::InvalidRequest("volume below minimum pulse count"));
    }
    // float-to-int `as` truncates and saturates
    Ok(pulses as u32)
}

fn hw(e: Box<dyn std::error::Error + Send + Sync>) -> PumpError {
    PumpError::Hardware(e.to_string())
}
