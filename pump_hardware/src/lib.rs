pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

use pump_traits::{Actuator, Sensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Shape of the simulated capacitive signal.
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Sensor samples per full pump cycle (one peak and one trough).
    pub samples_per_cycle: u32,
    /// Peak deviation from baseline while the pump runs.
    pub amplitude: i32,
    /// Resting reading.
    pub baseline: i32,
    /// Peak-to-peak uniform noise added to every reading.
    pub noise: i32,
    /// PRNG seed for the noise source.
    pub seed: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            samples_per_cycle: 40,
            amplitude: 400,
            baseline: 2_000,
            noise: 8,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    enabled: AtomicBool,
    enables: AtomicU32,
    disables: AtomicU32,
    reads: AtomicU64,
}

/// Simulated pump: an actuator and a sensor sharing one mechanical state.
///
/// While enabled, every sensor read advances the pump phase by one sample,
/// producing a sinusoid around the baseline. While disabled the sensor only
/// reports baseline plus noise.
#[derive(Debug, Clone)]
pub struct SimulatedPump {
    params: SimParams,
    state: Arc<SimState>,
}

impl SimulatedPump {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            state: Arc::new(SimState::default()),
        }
    }

    pub fn actuator(&self) -> SimulatedActuator {
        SimulatedActuator {
            state: self.state.clone(),
        }
    }

    pub fn sensor(&self) -> SimulatedSensor {
        SimulatedSensor {
            params: self.params,
            state: self.state.clone(),
            phase: 0,
            rng: self.params.seed.max(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    /// Number of enable commands received.
    pub fn enable_count(&self) -> u32 {
        self.state.enables.load(Ordering::Acquire)
    }

    /// Number of disable commands received.
    pub fn disable_count(&self) -> u32 {
        self.state.disables.load(Ordering::Acquire)
    }

    /// Number of sensor reads served.
    pub fn reads(&self) -> u64 {
        self.state.reads.load(Ordering::Acquire)
    }

    pub fn params(&self) -> SimParams {
        self.params
    }
}

impl Default for SimulatedPump {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

/// Simulated enable line.
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    state: Arc<SimState>,
}

impl Actuator for SimulatedActuator {
    fn enable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.enables.fetch_add(1, Ordering::AcqRel);
        self.state.enabled.store(true, Ordering::Release);
        tracing::trace!("pump enabled (simulated)");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.disables.fetch_add(1, Ordering::AcqRel);
        self.state.enabled.store(false, Ordering::Release);
        tracing::trace!("pump disabled (simulated)");
        Ok(())
    }
}

/// Simulated capacitive sensor.
#[derive(Debug)]
pub struct SimulatedSensor {
    params: SimParams,
    state: Arc<SimState>,
    phase: u32,
    rng: u32,
}

impl SimulatedSensor {
    fn next_noise(&mut self) -> i32 {
        if self.params.noise <= 0 {
            return 0;
        }
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = self.params.noise as u32 + 1;
        (x % span) as i32 - self.params.noise / 2
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        self.state.reads.fetch_add(1, Ordering::AcqRel);
        let mut value = self.params.baseline;
        if self.state.enabled.load(Ordering::Acquire) {
            let period = self.params.samples_per_cycle.max(1);
            let angle = std::f64::consts::TAU * f64::from(self.phase) / f64::from(period);
            value += (f64::from(self.params.amplitude) * angle.sin()).round() as i32;
            self.phase = (self.phase + 1) % period;
        }
        Ok(value + self.next_noise())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimParams {
        SimParams {
            noise: 0,
            ..SimParams::default()
        }
    }

    #[test]
    fn idle_sensor_reports_baseline() {
        let sim = SimulatedPump::new(quiet());
        let mut sensor = sim.sensor();
        for _ in 0..10 {
            assert_eq!(sensor.read().unwrap(), 2_000);
        }
        assert_eq!(sim.reads(), 10);
    }

    #[test]
    fn running_sensor_oscillates_around_baseline() {
        let sim = SimulatedPump::new(quiet());
        let mut actuator = sim.actuator();
        let mut sensor = sim.sensor();
        actuator.enable().unwrap();
        let cycle: Vec<i32> = (0..40).map(|_| sensor.read().unwrap()).collect();
        assert_eq!(cycle[0], 2_000);
        assert_eq!(cycle[10], 2_400);
        assert_eq!(cycle[30], 1_600);
        actuator.disable().unwrap();
        assert!(!sim.is_enabled());
        assert_eq!(sim.enable_count(), 1);
        assert_eq!(sim.disable_count(), 1);
    }

    #[test]
    fn noise_stays_within_bounds() {
        let sim = SimulatedPump::new(SimParams {
            noise: 10,
            ..SimParams::default()
        });
        let mut sensor = sim.sensor();
        for _ in 0..1_000 {
            let v = sensor.read().unwrap();
            assert!((1_995..=2_005).contains(&v), "reading {v} outside noise band");
        }
    }
}
