//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_MAX_RUN_MS;
use crate::run::abort_reason_name;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use pump_core::error::{AbortReason, BuildError, PumpError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuator => {
                "What happened: No actuator was provided to the pump.\nLikely causes: The enable pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the actuator is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::MissingSensor => {
                "What happened: No sensor was provided to the pump.\nLikely causes: The ADC failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::InvalidRequest(msg) => format!(
                "What happened: Request rejected ({msg}).\nLikely causes: Zero pulses, or a volume too small for pump.pulses_per_ml.\nHow to fix: Ask for more than 5 pulses' worth of volume."
            ),
            PumpError::Busy => "What happened: The pump is already running.\nLikely causes: A previous run has not finished or was abandoned.\nHow to fix: Wait for it to finish, or stop it first.".to_string(),
            PumpError::Spawn(cause) => format!(
                "What happened: Could not start the pump worker ({cause}).\nLikely causes: Thread or memory limits reached.\nHow to fix: Free resources, or run without --background."
            ),
            PumpError::Hardware(cause) => format!(
                "What happened: Hardware failure during the run ({cause}).\nLikely causes: Sensor unplugged, wrong ADC channel, or GPIO permissions.\nHow to fix: Check [pins] and wiring, then run `pump self-check`."
            ),
            PumpError::Abort(AbortReason::MaxRuntime) => "What happened: max run time was exceeded.\nLikely causes: No pulses detected (dry pump, sensor misplaced) or a target too large.\nHow to fix: Check the sensor signal or increase safety.max_run_ms.".to_string(),
            PumpError::Abort(AbortReason::Cancelled) => "What happened: The run was cancelled.\nLikely causes: Ctrl-C or --stop-after-ms.\nHow to fix: Start a new run when ready.".to_string(),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path.\nHow to fix: Pass an existing TOML file. Original: {msg}"
        );
    }

    if lower.contains("parse config") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins]/[pump] sections or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    if lower.contains("enable pin") || lower.contains("sensor adc") {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect pin/channel numbers or insufficient GPIO/SPI permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access GPIO and SPI.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> serde_json::Value {
    use pump_core::error::{AbortReason, PumpError};
    use serde_json::json;

    let message = humanize(err);
    match err.downcast_ref::<PumpError>() {
        Some(PumpError::Abort(reason)) => {
            let mut obj = json!({ "reason": abort_reason_name(*reason), "message": message });
            if matches!(reason, AbortReason::MaxRuntime)
                && let Some(ms) = LAST_MAX_RUN_MS.get()
            {
                obj["details"] = json!({ "max_run_ms": ms });
            }
            obj
        }
        Some(PumpError::Hardware(_)) => json!({ "reason": "Hardware", "message": message }),
        Some(PumpError::InvalidRequest(_)) => {
            json!({ "reason": "InvalidRequest", "message": message })
        }
        _ => json!({ "reason": "Error", "message": message }),
    }
}
