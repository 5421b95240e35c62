// src/logging.rs

//! Diagnostics go to stderr through `tracing`; stdout carries only the
//! `--dry-run` plan.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Accepts full filter directives, e.g. `info,flutter_assemble::build=trace`.
pub const LOG_ENV_VAR: &str = "ASSEMBLE_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    fmt()
        .with_env_filter(log_filter(cli_level, env_value.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

/// `--log-level` wins and applies to this crate only; dependencies stay at
/// `warn`. Otherwise `ASSEMBLE_LOG` is used when it parses, else `info`.
pub fn log_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(format!("warn,flutter_assemble={}", directive(level)));
    }
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
