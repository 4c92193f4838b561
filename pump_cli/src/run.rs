//! Pump run execution: config mapping, hardware assembly, and waiting on
//! background runs.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use pump_core::builder::{BoxedActuator, BoxedSensor};
use pump_core::{Diagnostics, Pump, PumpBuilder, PumpError, StopOutcome};

use crate::cli::LAST_MAX_RUN_MS;

/// Amount requested on the command line.
#[derive(Debug, Clone, Copy)]
pub enum Amount {
    Pulses(u32),
    Millilitres(f32),
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub amount: Amount,
    pub full_diagnostics: bool,
    pub background: bool,
    pub stop_after_ms: Option<u64>,
}

pub fn abort_reason_name(r: pump_core::AbortReason) -> &'static str {
    use pump_core::AbortReason::*;
    match r {
        Cancelled => "Cancelled",
        MaxRuntime => "MaxRuntime",
    }
}

/// Build the actuator/sensor pair: Raspberry Pi GPIO + MCP3008 with the
/// `hardware` feature on Linux, the simulated pump otherwise.
pub fn make_hardware(cfg: &pump_config::Config) -> eyre::Result<(BoxedActuator, BoxedSensor)> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use pump_hardware::rpi::{GpioActuator, Mcp3008Sensor};
        let actuator = GpioActuator::new(cfg.pins.enable).wrap_err("open pump enable pin")?;
        let sensor = Mcp3008Sensor::new(cfg.pins.sensor_channel, Mcp3008Sensor::DEFAULT_CLOCK_HZ)
            .wrap_err("open sensor ADC")?;
        tracing::info!(
            enable = cfg.pins.enable,
            channel = cfg.pins.sensor_channel,
            "hardware backend ready"
        );
        Ok((Box::new(actuator), Box::new(sensor)))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let s = &cfg.simulation;
        let sim = pump_hardware::SimulatedPump::new(pump_hardware::SimParams {
            samples_per_cycle: s.samples_per_cycle,
            amplitude: s.amplitude,
            baseline: s.baseline,
            noise: s.noise,
            ..pump_hardware::SimParams::default()
        });
        tracing::info!(
            samples_per_cycle = s.samples_per_cycle,
            amplitude = s.amplitude,
            "simulated backend ready"
        );
        Ok((Box::new(sim.actuator()), Box::new(sim.sensor())))
    }
}

fn builder(
    cfg: &pump_config::Config,
    hw: (BoxedActuator, BoxedSensor),
) -> PumpBuilder<pump_core::Set, pump_core::Set> {
    let (actuator, sensor) = hw;
    PumpBuilder::new()
        .with_actuator(actuator)
        .with_sensor(sensor)
        .with_pump((&cfg.pump).into())
        .with_sampling((&cfg.sampling).into())
        .with_safety((&cfg.safety).into())
        .with_stop((&cfg.stop).into())
}

fn start(pump: &mut dyn Pump, amount: Amount, full: bool) -> Result<(), PumpError> {
    match amount {
        Amount::Pulses(n) => pump.run_for_pulses(n, full),
        Amount::Millilitres(ml) => pump.run_for_ml(ml, full),
    }
}

/// Execute one run and return its diagnostics.
///
/// Blocking runs complete inside `start`. Background runs are polled here;
/// `shutdown` (Ctrl-C) or `stop_after_ms` request a stop.
pub fn run_pump(
    cfg: &pump_config::Config,
    args: &RunArgs,
    hw: (BoxedActuator, BoxedSensor),
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<Diagnostics> {
    let _ = LAST_MAX_RUN_MS.set(cfg.safety.max_run_ms);
    let b = builder(cfg, hw);

    if !args.background {
        let mut pump = b.build()?;
        pump.begin()?;
        tracing::info!(amount = ?args.amount, mode = "blocking", "run start");
        start(&mut pump, args.amount, args.full_diagnostics)?;
        return Ok(pump.diagnostics().clone());
    }

    let mut task = b.build_async()?;
    task.with_control(|c| c.begin())??;
    tracing::info!(amount = ?args.amount, mode = "background", "run start");
    start(&mut task, args.amount, args.full_diagnostics)?;

    let t0 = Instant::now();
    let stop_after = args.stop_after_ms.map(Duration::from_millis);
    let poll = Duration::from_millis(cfg.stop.poll_ms.max(1));
    while !task.wait(poll) {
        let deadline_hit = stop_after.is_some_and(|d| t0.elapsed() >= d);
        if shutdown.load(Ordering::Relaxed) || deadline_hit {
            match task.stop() {
                StopOutcome::Forced => {
                    tracing::error!("worker did not stop in time; switch the pump off manually");
                }
                outcome => tracing::info!(?outcome, "run stopped"),
            }
            break;
        }
    }

    match task.last_result() {
        Some(Ok(())) => {}
        Some(Err(e)) => return Err(eyre::Report::new(e)),
        None => eyre::bail!("background run ended without a result"),
    }
    task.diagnostics()
        .ok_or_else(|| eyre::Report::new(PumpError::Busy))
        .wrap_err("collect diagnostics")
}

/// Drive the pump off, then read the sensor once.
pub fn self_check(cfg: &pump_config::Config, hw: (BoxedActuator, BoxedSensor)) -> eyre::Result<i32> {
    let mut pump = builder(cfg, hw).build()?;
    pump.begin().wrap_err("actuator off")?;
    let reading = pump.read_sensor().wrap_err("sensor read")?;
    tracing::info!(reading, "self-check ok");
    Ok(reading)
}

/// Write `index,value,is_pulse` rows for the recorded waveform.
pub fn write_trace_csv(path: &Path, d: &Diagnostics) -> eyre::Result<()> {
    let mut w = csv::Writer::from_path(path).wrap_err_with(|| format!("create {}", path.display()))?;
    w.write_record(["index", "value", "is_pulse"])?;
    for (i, (v, p)) in d.full_shape.iter().zip(&d.is_pulse).enumerate() {
        w.write_record([i.to_string(), v.to_string(), p.to_string()])?;
    }
    w.flush()?;
    Ok(())
}
