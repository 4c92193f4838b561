//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Effective safety cap of the current run (for JSON error details).
pub static LAST_MAX_RUN_MS: OnceLock<u64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pump", version, about = "Pulse-monitored dosing pump CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/pump_config.toml")]
    pub config: PathBuf,

    /// Emit JSON (logs as JSON lines, result as one JSON object)
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispense a number of pulses or a volume
    #[command(group(ArgGroup::new("amount").required(true).args(["pulses", "ml"])))]
    Run {
        /// Pulses to dispense
        #[arg(long)]
        pulses: Option<u32>,
        /// Millilitres to dispense (converted with pump.pulses_per_ml)
        #[arg(long)]
        ml: Option<f32>,
        /// Record the full waveform with per-sample pulse flags
        #[arg(long, action = ArgAction::SetTrue)]
        full_diagnostics: bool,
        /// Run on a background worker; Ctrl-C requests a cooperative stop
        #[arg(long, action = ArgAction::SetTrue)]
        background: bool,
        /// Stop a background run after this many milliseconds
        #[arg(long, value_name = "MS", requires = "background")]
        stop_after_ms: Option<u64>,
        /// Write the recorded waveform as CSV (implies --full-diagnostics)
        #[arg(long, value_name = "FILE")]
        trace_csv: Option<PathBuf>,
    },
    /// Drive the pump off and read the sensor once
    SelfCheck,
}
