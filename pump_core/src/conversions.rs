//! `From` implementations bridging `pump_config` types to `pump_core` types.

use crate::config::{PumpCfg, SafetyCfg, SamplingCfg, StopCfg};

// ── PumpCfg ──────────────────────────────────────────────────────────────────

impl From<&pump_config::PumpCfg> for PumpCfg {
    fn from(c: &pump_config::PumpCfg) -> Self {
        Self {
            lookahead: c.lookahead,
            pulses_per_ml: c.pulses_per_ml,
            approx_samples_per_pulse: c.approx_samples_per_pulse,
        }
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&pump_config::SamplingCfg> for SamplingCfg {
    fn from(c: &pump_config::SamplingCfg) -> Self {
        Self {
            period_us: c.period_us,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&pump_config::Safety> for SafetyCfg {
    fn from(c: &pump_config::Safety) -> Self {
        Self {
            max_run_ms: c.max_run_ms,
        }
    }
}

// ── StopCfg ──────────────────────────────────────────────────────────────────

impl From<&pump_config::StopCfg> for StopCfg {
    fn from(c: &pump_config::StopCfg) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            poll_ms: c.poll_ms,
        }
    }
}
