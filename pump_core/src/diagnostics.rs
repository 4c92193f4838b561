//! Per-run pulse statistics.

use serde::Serialize;

/// Raw record of one run: pulse timestamps, extremum values and, when
/// requested, the full waveform with per-sample pulse flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Pulse times in µs since run start, attributed to the extremum sample.
    pub pulse_times_us: Vec<u64>,
    /// Detector center value at each pulse (raw sensor units).
    pub values_at_pulses: Vec<i32>,
    /// Every loop sample relative to baseline (full diagnostics only).
    pub full_shape: Vec<i32>,
    /// Parallel to `full_shape`: true where a pulse was attributed.
    pub is_pulse: Vec<bool>,
    /// Baseline used to recenter this run's samples.
    pub baseline: i32,
}

/// Structured view of a run for logs, JSON output and callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiagnosticsSummary {
    pub pulses: usize,
    pub average_interval_us: f32,
    pub interval_std_dev_us: f32,
    pub average_amplitude: f32,
    pub amplitude_std_dev: f32,
    pub baseline: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_flags: Option<Vec<bool>>,
}

/// Mean and population deviation of `xs`; (0, 0) when empty.
fn mean_std(xs: impl Iterator<Item = f64> + Clone) -> (f32, f32) {
    let n = xs.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = xs.clone().sum::<f64>() / n as f64;
    let var = xs.map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    (mean as f32, var.sqrt() as f32)
}

impl Diagnostics {
    pub fn pulse_count(&self) -> usize {
        self.pulse_times_us.len()
    }

    pub fn has_full_shape(&self) -> bool {
        !self.full_shape.is_empty()
    }

    fn intervals(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.pulse_times_us
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]) as f64)
    }

    // Consecutive values alternate between peaks and troughs, so each
    // difference approximates a half peak-to-peak swing.
    fn swings(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.values_at_pulses
            .windows(2)
            .map(|w| (i64::from(w[1]) - i64::from(w[0])).abs() as f64)
    }

    /// Mean time between consecutive pulses in µs (0 with fewer than 2 pulses).
    pub fn average_interval_us(&self) -> f32 {
        mean_std(self.intervals()).0
    }

    pub fn interval_std_dev_us(&self) -> f32 {
        mean_std(self.intervals()).1
    }

    /// Mean absolute difference between consecutive extremum values.
    pub fn average_amplitude(&self) -> f32 {
        mean_std(self.swings()).0
    }

    pub fn amplitude_std_dev(&self) -> f32 {
        mean_std(self.swings()).1
    }

    /// Drop the recorded run; the baseline is kept.
    pub fn clear(&mut self) {
        self.pulse_times_us.clear();
        self.values_at_pulses.clear();
        self.full_shape.clear();
        self.is_pulse.clear();
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        let full = self.has_full_shape();
        DiagnosticsSummary {
            pulses: self.pulse_count(),
            average_interval_us: self.average_interval_us(),
            interval_std_dev_us: self.interval_std_dev_us(),
            average_amplitude: self.average_amplitude(),
            amplitude_std_dev: self.amplitude_std_dev(),
            baseline: self.baseline,
            waveform: full.then(|| self.full_shape.clone()),
            pulse_flags: full.then(|| self.is_pulse.clone()),
        }
    }
}

impl core::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Pulses: {}; Average pulse time: {:.1} +- {:.1} us; Average amplitude: {:.1} +- {:.1}; Baseline: {}",
            self.pulse_count(),
            self.average_interval_us(),
            self.interval_std_dev_us(),
            self.average_amplitude(),
            self.amplitude_std_dev(),
            self.baseline
        )
    }
}
