//! Tracing subscriber setup: console layer plus optional rotating file sink.

use pump_config::Logging;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::FILE_GUARD;

/// `RUST_LOG` wins over the CLI level; an unparsable level falls back to info.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn rotation(policy: Option<&str>) -> tracing_appender::rolling::Rotation {
    use tracing_appender::rolling::Rotation;
    match policy {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber. Console output goes to stderr so stdout
/// carries only the run result.
pub fn init(level: &str, json: bool, logging: Option<&Logging>) {
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    };

    let file_layer = logging.and_then(|l| {
        let path = std::path::Path::new(l.file.as_deref()?);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name()?;
        let appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation(l.rotation.as_deref()),
            dir,
            name,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = l.level.as_deref().unwrap_or(level);
        Some(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(env_filter(file_level)),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(console.with_filter(env_filter(level)))
        .with(file_layer)
        .try_init();
}
