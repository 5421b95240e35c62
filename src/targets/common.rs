// src/targets/common.rs

//! Platform-independent Dart compilation targets.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use crate::artifacts::Artifact;
use crate::environment::Environment;
use crate::exec::{ProcessCommand, ProcessOutput};
use crate::source::Source;
use crate::target::{BoxFuture, Target};
use crate::targets::{AOT_ELF_PROFILE, AOT_ELF_RELEASE, KERNEL_SNAPSHOT};
use crate::types::{BuildMode, DEFAULT_TARGET_FILE, TARGET_FILE, TRACK_WIDGET_CREATION};

/// Kernel file produced by [`KernelSnapshot`], relative to `BUILD_DIR`.
pub const APP_DILL: &str = "app.dill";
/// AOT ELF snapshot produced by [`AotElf`], relative to `BUILD_DIR`.
pub const APP_SO: &str = "app.so";
pub const KERNEL_SNAPSHOT_DEPFILE: &str = "kernel_snapshot.d";

/// Compiles the application entrypoint to a kernel file with the
/// `frontend_server`. The compiler writes a depfile listing every Dart
/// source it read.
#[derive(Debug, Clone, Default)]
pub struct KernelSnapshot;

impl Target for KernelSnapshot {
    fn name(&self) -> &str {
        KERNEL_SNAPSHOT
    }

    fn inputs(&self) -> Vec<Source> {
        vec![
            Source::pattern("{PROJECT_DIR}/.dart_tool/package_config.json"),
            Source::artifact(Artifact::PlatformKernelDill),
            Source::artifact(Artifact::EngineDartBinary),
            Source::artifact(Artifact::FrontendServerSnapshot),
        ]
    }

    fn outputs(&self) -> Vec<Source> {
        vec![Source::pattern(format!("{{BUILD_DIR}}/{APP_DILL}"))]
    }

    fn depfiles(&self) -> Vec<String> {
        vec![KERNEL_SNAPSHOT_DEPFILE.to_string()]
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mode = env.build_mode(self.name())?;
            let platform = env.target_platform_opt();
            let artifacts = env.artifacts();

            let dart = artifacts.artifact_path(Artifact::EngineDartBinary, platform, Some(mode));
            let frontend_server =
                artifacts.artifact_path(Artifact::FrontendServerSnapshot, platform, Some(mode));
            let sdk_root =
                artifacts.artifact_path(Artifact::FlutterPatchedSdkPath, platform, Some(mode));

            let target_file = env.define(TARGET_FILE).unwrap_or(DEFAULT_TARGET_FILE);
            let track_widget_creation = env.define(TRACK_WIDGET_CREATION) == Some("true");

            let mut command = ProcessCommand::new(dart)
                .arg(frontend_server.display().to_string())
                .arg("--sdk-root")
                .arg(format!("{}/", sdk_root.display()))
                .arg("--target=flutter")
                .arg("--no-print-incremental-dependencies")
                .arg(format!("-Ddart.vm.profile={}", mode == BuildMode::Profile))
                .arg(format!("-Ddart.vm.product={}", mode.is_product()));
            if track_widget_creation {
                command = command.arg("--track-widget-creation");
            }
            if mode.is_precompiled() {
                command = command.args(["--aot", "--tfa"]);
            }
            let command = command
                .arg("--packages")
                .arg(
                    env.project_dir()
                        .join(".dart_tool")
                        .join("package_config.json")
                        .display()
                        .to_string(),
                )
                .arg("--output-dill")
                .arg(env.build_dir().join(APP_DILL).display().to_string())
                .arg("--depfile")
                .arg(
                    env.build_dir()
                        .join(KERNEL_SNAPSHOT_DEPFILE)
                        .display()
                        .to_string(),
                )
                .arg(env.project_dir().join(target_file).display().to_string())
                .current_dir(env.project_dir());

            let output = env.process_manager().run(&command).await?;
            check_exit("frontend_server", &output)
        })
    }
}

/// Compiles `app.dill` to an AOT ELF snapshot with `gen_snapshot`.
#[derive(Debug, Clone, Copy)]
pub struct AotElf {
    mode: BuildMode,
}

impl AotElf {
    pub fn profile() -> Self {
        Self {
            mode: BuildMode::Profile,
        }
    }

    pub fn release() -> Self {
        Self {
            mode: BuildMode::Release,
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }
}

impl Target for AotElf {
    fn name(&self) -> &str {
        match self.mode {
            BuildMode::Profile => AOT_ELF_PROFILE,
            _ => AOT_ELF_RELEASE,
        }
    }

    fn inputs(&self) -> Vec<Source> {
        vec![
            Source::pattern(format!("{{BUILD_DIR}}/{APP_DILL}")),
            Source::Artifact {
                artifact: Artifact::GenSnapshot,
                platform: None,
                mode: Some(self.mode),
            },
        ]
    }

    fn outputs(&self) -> Vec<Source> {
        vec![Source::pattern(format!("{{BUILD_DIR}}/{APP_SO}"))]
    }

    fn dependencies(&self) -> Vec<Arc<dyn Target>> {
        vec![Arc::new(KernelSnapshot)]
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mode = env.build_mode(self.name())?;
            if !mode.is_precompiled() {
                bail!("AOT snapshot is not supported in {mode} mode");
            }
            if mode != self.mode {
                bail!("{} cannot build a {mode} snapshot", self.name());
            }
            let platform = env.target_platform_opt();
            let gen_snapshot =
                env.artifacts()
                    .artifact_path(Artifact::GenSnapshot, platform, Some(self.mode));

            let mut command = ProcessCommand::new(gen_snapshot)
                .arg("--deterministic")
                .arg("--snapshot_kind=app-aot-elf")
                .arg(format!("--elf={}", env.build_dir().join(APP_SO).display()));
            if mode == BuildMode::Release {
                command = command.arg("--strip");
            }
            let command = command
                .arg(env.build_dir().join(APP_DILL).display().to_string())
                .current_dir(env.project_dir());

            let output = env.process_manager().run(&command).await?;
            check_exit("gen_snapshot", &output)
        })
    }
}

pub(crate) fn check_exit(tool: &str, output: &ProcessOutput) -> Result<()> {
    if output.success() {
        debug!(tool, "tool finished");
        return Ok(());
    }
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        bail!("{tool} exited with code {}", output.exit_code);
    }
    bail!("{tool} exited with code {}: {stderr}", output.exit_code)
}
