// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `flutter-assemble`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flutter-assemble",
    version,
    about = "Incrementally build Flutter application bundles.",
    long_about = None
)]
pub struct CliArgs {
    /// Targets to build, e.g. `debug_bundle_linux_assets`.
    #[arg(value_name = "TARGET", required = true)]
    pub targets: Vec<String>,

    /// Path to the project config (TOML). A missing file is not an error.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Define passed to targets, e.g. `-d BuildMode=release`. Repeatable.
    #[arg(short = 'd', long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,

    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Defaults to `<project>/.dart_tool/flutter_build/<hash of defines>`.
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Bundle output directory. Defaults to `<project>/build`.
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub flutter_root: Option<PathBuf>,

    /// Write the aggregate depfile of the build to this path.
    #[arg(long, value_name = "PATH")]
    pub depfile: Option<PathBuf>,

    /// Write every input file of the build, one per line.
    #[arg(long, value_name = "PATH")]
    pub build_inputs: Option<PathBuf>,

    /// Write every output file of the build, one per line.
    #[arg(long, value_name = "PATH")]
    pub build_outputs: Option<PathBuf>,

    /// Maximum number of targets running at once.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_concurrency: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSEMBLE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve targets and print the execution order without building.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
