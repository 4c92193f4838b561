//! Common time/period helpers for pump_core.

/// Number of microseconds in one millisecond.
pub const MICROS_PER_MILLI: u64 = 1_000;

/// Extra pulses reserved in diagnostics buffers beyond the requested target.
pub const RESERVE_SLACK_PULSES: usize = 10;

/// Detection lag of a lookahead window in microseconds.
#[inline]
pub fn detection_lag_us(lookahead: usize, period_us: u64) -> u64 {
    (lookahead as u64).saturating_mul(period_us)
}

/// Attribute a detection at `now_us` back to when the extremum was sampled.
/// Saturates at 0 for detections within the first window after start.
#[inline]
pub fn corrected_timestamp_us(now_us: u64, lookahead: usize, period_us: u64) -> u64 {
    now_us.saturating_sub(detection_lag_us(lookahead, period_us))
}

/// Waveform capacity for `pulses` given a samples-per-pulse estimate.
/// Returns 0 when no estimate exists yet.
#[inline]
pub fn waveform_reserve(samples_per_pulse: u32, pulses: u32) -> usize {
    (samples_per_pulse as usize)
        .saturating_mul((pulses as usize).saturating_add(RESERVE_SLACK_PULSES))
}
