//! `pump` binary: run the dosing pump from the command line.

mod cli;
mod error_fmt;
mod logging;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::run::{Amount, RunArgs};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let code = match real_main(&cli) {
        Ok(()) => 0,
        Err(e) => {
            report(&e);
            1
        }
    };
    std::process::exit(code);
}

fn report(err: &eyre::Report) {
    tracing::error!(error = %err, "command failed");
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!(
            "{}",
            json!({ "ok": false, "error": error_fmt::format_error_json(err) })
        );
    } else {
        eprintln!("{}", error_fmt::humanize(err));
    }
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    // the file sink comes from the config; a failed load logs to console only
    let cfg = match pump_config::load_file(&cli.config) {
        Ok(cfg) => {
            logging::init(&cli.log_level, cli.json, Some(&cfg.logging));
            cfg
        }
        Err(e) => {
            logging::init(&cli.log_level, cli.json, None);
            return Err(e);
        }
    };
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let hw = run::make_hardware(&cfg).wrap_err("initialize hardware")?;

    match &cli.cmd {
        Commands::SelfCheck => {
            let reading = run::self_check(&cfg, hw)?;
            if cli.json {
                println!("{}", json!({ "ok": true, "sensor": reading }));
            } else {
                println!("Self-check OK (sensor reading: {reading})");
            }
        }
        Commands::Run {
            pulses,
            ml,
            full_diagnostics,
            background,
            stop_after_ms,
            trace_csv,
        } => {
            let amount = match (pulses, ml) {
                (Some(n), _) => Amount::Pulses(*n),
                (None, Some(v)) => Amount::Millilitres(*v),
                (None, None) => eyre::bail!("either --pulses or --ml is required"),
            };
            let args = RunArgs {
                amount,
                full_diagnostics: *full_diagnostics || trace_csv.is_some(),
                background: *background,
                stop_after_ms: *stop_after_ms,
            };

            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = shutdown.clone();
                ctrlc::set_handler(move || {
                    // second Ctrl-C gives up on the cooperative stop
                    if flag.swap(true, Ordering::Relaxed) {
                        std::process::exit(130);
                    }
                })
                .wrap_err("install Ctrl-C handler")?;
            }

            let diagnostics = run::run_pump(&cfg, &args, hw, &shutdown)?;
            if let Some(path) = trace_csv {
                run::write_trace_csv(path, &diagnostics)?;
            }
            if cli.json {
                println!(
                    "{}",
                    json!({ "ok": true, "diagnostics": diagnostics.summary() })
                );
            } else {
                println!("Run complete. {diagnostics}");
            }
        }
    }
    Ok(())
}
