// src/lib.rs

pub mod artifacts;
pub mod build;
pub mod cli;
pub mod config;
pub mod depfile;
pub mod environment;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod manifest;
pub mod source;
pub mod target;
pub mod targets;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::build::{BuildOptions, BuildResult, BuildSystem, TargetGraph};
use crate::cli::CliArgs;
use crate::config::{load_optional, ConfigFile};
use crate::environment::Environment;
use crate::target::Target;
use crate::targets::{register_command_targets, PubspecAssetBundle, TargetRegistry};

pub use crate::build::TargetStatus;
pub use crate::depfile::Depfile;
pub use crate::errors::BuildError;
pub use crate::source::Source;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (optional `assemble.toml`)
/// - environment construction from config + CLI overrides
/// - the target registry (built-ins + config command targets)
/// - the build system, and the optional depfile / file-list outputs
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_optional(&args.config)?;
    let config_dir = config_root_dir(&args.config);

    let env = environment_from(&args, &config, &config_dir)?;

    let mut registry = TargetRegistry::with_builtin(Arc::new(PubspecAssetBundle));
    register_command_targets(&mut registry, &config)?;

    let roots = args
        .targets
        .iter()
        .map(|name| registry.get(name))
        .collect::<errors::Result<Vec<Arc<dyn Target>>>>()?;

    let mut options = BuildOptions::default();
    if let Some(n) = config.build.max_concurrency {
        options.max_concurrency = n;
    }
    if let Some(n) = args.max_concurrency {
        options.max_concurrency = usize::from(n);
    }
    let build_system = BuildSystem::new(options);

    if args.dry_run {
        let graph = build_system.plan(&roots)?;
        print_dry_run(&env, &graph);
        return Ok(());
    }

    let result = build_system.build_all(&roots, &env).await?;
    if !result.success {
        bail!("{}", failure_report(&result));
    }

    write_build_files(&args, &result)?;
    info!(
        built = result.built_targets().len(),
        targets = result.statuses.len(),
        "assemble finished"
    );
    Ok(())
}

/// Directory that relative paths in the config are resolved against.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_dir(base: &Path, path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    std::path::absolute(&joined).with_context(|| format!("resolving directory {:?}", joined))
}

/// CLI flags win over `[environment]`; config paths are relative to the
/// config file, CLI paths to the working directory.
fn environment_from(args: &CliArgs, config: &ConfigFile, config_dir: &Path) -> Result<Environment> {
    let cwd = PathBuf::from(".");
    let pick = |cli: &Option<PathBuf>, cfg: &Option<PathBuf>| -> Result<Option<PathBuf>> {
        match (cli, cfg) {
            (Some(p), _) => resolve_dir(&cwd, p).map(Some),
            (None, Some(p)) => resolve_dir(config_dir, p).map(Some),
            (None, None) => Ok(None),
        }
    };

    let section = &config.environment;
    let project_dir = match pick(&args.project_dir, &section.project_dir)? {
        Some(dir) => dir,
        None => resolve_dir(&cwd, Path::new("."))?,
    };

    let mut builder = Environment::builder(project_dir)
        .defines(config.defines.clone())
        .defines(args.defines.iter().cloned());
    if let Some(dir) = pick(&args.build_dir, &section.build_dir)? {
        builder = builder.build_dir(dir);
    }
    if let Some(dir) = pick(&args.output_dir, &section.output_dir)? {
        builder = builder.output_dir(dir);
    }
    if let Some(dir) = pick(&args.flutter_root, &section.flutter_root)? {
        builder = builder.flutter_root(dir);
    }
    if let Some(dir) = pick(&None, &section.cache_dir)? {
        builder = builder.cache_dir(dir);
    }

    let env = builder.build();
    debug!(
        project_dir = ?env.project_dir(),
        build_dir = ?env.build_dir(),
        output_dir = ?env.output_dir(),
        defines = ?env.defines(),
        "environment"
    );
    Ok(env)
}

/// Human-readable summary naming every failed target and its cause chain.
pub fn failure_report(result: &BuildResult) -> String {
    let mut report = String::from("build failed");
    for failure in &result.failures {
        report.push_str(&format!("\n  {}: {}", failure.target, failure.error));
    }
    report
}

fn write_build_files(args: &CliArgs, result: &BuildResult) -> Result<()> {
    let fs = crate::fs::RealFileSystem;
    let service = crate::depfile::DepfileService::new(Arc::new(fs.clone()));

    if let Some(path) = &args.depfile {
        service.write(&result.depfile(), path)?;
        debug!(path = ?path, "wrote aggregate depfile");
    }
    if let Some(path) = &args.build_inputs {
        write_file_list(&fs, path, &result.input_files)?;
    }
    if let Some(path) = &args.build_outputs {
        write_file_list(&fs, path, &result.output_files)?;
    }
    Ok(())
}

fn write_file_list(fs: &dyn crate::fs::FileSystem, path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut contents = String::new();
    for file in files {
        contents.push_str(&file.to_string_lossy());
        contents.push('\n');
    }
    fs.write(path, contents.as_bytes())
}

/// Simple dry-run output: environment and execution order.
fn print_dry_run(env: &Environment, graph: &TargetGraph) {
    println!("flutter-assemble dry-run");
    println!("  project_dir = {}", env.project_dir().display());
    println!("  build_dir = {}", env.build_dir().display());
    println!("  output_dir = {}", env.output_dir().display());
    for (key, value) in env.defines() {
        println!("  define {key} = {value}");
    }
    println!();

    println!("execution order ({}):", graph.len());
    for (idx, target) in graph.order().enumerate() {
        let deps: Vec<&str> = graph
            .dependencies_of(idx)
            .iter()
            .map(|&d| graph.target(d).name())
            .collect();
        if deps.is_empty() {
            println!("  {}. {}", idx + 1, target.name());
        } else {
            println!("  {}. {} (after {})", idx + 1, target.name(), deps.join(", "));
        }
    }

    debug!("dry-run complete (no execution)");
}
