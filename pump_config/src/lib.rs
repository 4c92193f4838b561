#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the pulse-monitored pump.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` and `[pump]` is optional and falls back to
//!   the defaults documented on each struct.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// GPIO driving the pump enable line (active high).
    pub enable: u8,
    /// ADC channel the capacitive sensor is wired to.
    pub sensor_channel: u8,
}

#[derive(Debug, Deserialize)]
pub struct PumpCfg {
    /// Lookahead window L; detectors keep 2L+1 samples.
    pub lookahead: usize,
    /// Calibrated pulses per millilitre of pumped fluid.
    pub pulses_per_ml: f32,
    /// Optional initial samples-per-pulse estimate (0 = unknown).
    #[serde(default)]
    pub approx_samples_per_pulse: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    /// Sensor sampling period in microseconds.
    pub period_us: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self { period_us: 2_000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Hard cap on a single run in milliseconds (0 disables).
    pub max_run_ms: u64,
}

impl Default for Safety {
    fn default() -> Self {
        Self { max_run_ms: 60_000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StopCfg {
    /// How long stop() waits for the worker to exit cooperatively.
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

/// Parameters of the simulated pump used when no hardware backend is built.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    /// Sensor samples per full pump cycle (one peak + one trough).
    pub samples_per_cycle: u32,
    /// Peak deviation from baseline while the pump runs.
    pub amplitude: i32,
    /// Resting sensor reading.
    pub baseline: i32,
    /// Peak-to-peak uniform noise added to each reading.
    pub noise: i32,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            samples_per_cycle: 40,
            amplitude: 400,
            baseline: 2_000,
            noise: 8,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    pub pump: PumpCfg,
    #[serde(default)]
    pub sampling: SamplingCfg,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub stop: StopCfg,
    #[serde(default)]
    pub simulation: SimulationCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pump
        if self.pump.lookahead == 0 {
            eyre::bail!("pump.lookahead must be >= 1");
        }
        if self.pump.lookahead > 1_000 {
            eyre::bail!("pump.lookahead is unreasonably large (>1000)");
        }
        if !self.pump.pulses_per_ml.is_finite() || self.pump.pulses_per_ml <= 0.0 {
            eyre::bail!("pump.pulses_per_ml must be a finite value > 0");
        }

        // Sampling
        if self.sampling.period_us == 0 {
            eyre::bail!("sampling.period_us must be >= 1");
        }
        if self.sampling.period_us > 1_000_000 {
            eyre::bail!("sampling.period_us is unreasonably large (>1s)");
        }

        // Stop
        if self.stop.timeout_ms == 0 {
            eyre::bail!("stop.timeout_ms must be >= 1");
        }
        if self.stop.poll_ms == 0 {
            eyre::bail!("stop.poll_ms must be >= 1");
        }
        if self.stop.poll_ms > self.stop.timeout_ms {
            eyre::bail!("stop.poll_ms must not exceed stop.timeout_ms");
        }

        // Simulation
        if self.simulation.samples_per_cycle < 4 {
            eyre::bail!("simulation.samples_per_cycle must be >= 4");
        }
        if self.simulation.amplitude <= 0 {
            eyre::bail!("simulation.amplitude must be > 0");
        }
        if self.simulation.noise < 0 {
            eyre::bail!("simulation.noise must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
