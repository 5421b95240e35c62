// src/targets/linux.rs

//! Linux desktop targets: unpacking the engine and assembling the bundle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::artifacts::Artifact;
use crate::depfile::Depfile;
use crate::environment::Environment;
use crate::exec::{copy_files, CopyMode};
use crate::fs::walk_files;
use crate::source::Source;
use crate::target::{BoxFuture, Target};
use crate::targets::assets::{
    asset_inputs, asset_outputs, assets_dir, copy_assets, AssetBundle,
};
use crate::targets::common::{AotElf, KernelSnapshot, APP_DILL, APP_SO};
use crate::targets::{
    DEBUG_BUNDLE_LINUX_ASSETS, PROFILE_BUNDLE_LINUX_ASSETS, RELEASE_BUNDLE_LINUX_ASSETS,
    UNPACK_LINUX,
};
use crate::types::{BuildMode, TargetPlatform};

/// Engine files are unpacked here, relative to `PROJECT_DIR`.
pub const EPHEMERAL_DIR: &str = "linux/flutter/ephemeral";
pub const LINUX_ENGINE_DEPFILE: &str = "linux_engine_sources.d";

/// Name of the AOT library inside the bundle, relative to `OUTPUT_DIR`.
pub const BUNDLE_LIBAPP: &str = "lib/libapp.so";
/// Name of the kernel file inside `flutter_assets` for debug bundles.
pub const KERNEL_BLOB: &str = "kernel_blob.bin";

const DECLARED_HEADERS: [&str; 4] = [
    "flutter_linux.h",
    "fl_dart_project.h",
    "fl_engine.h",
    "fl_view.h",
];

/// Copies the Linux engine library, ICU data, and the `flutter_linux`
/// headers into `linux/flutter/ephemeral`.
///
/// Only a handful of headers are declared; the depfile records every file
/// that was actually copied.
#[derive(Debug, Clone, Default)]
pub struct UnpackLinux;

impl Target for UnpackLinux {
    fn name(&self) -> &str {
        UNPACK_LINUX
    }

    fn inputs(&self) -> Vec<Source> {
        vec![
            Source::artifact(Artifact::FlutterLinuxLibrary),
            Source::artifact(Artifact::IcuData),
        ]
    }

    fn outputs(&self) -> Vec<Source> {
        let mut outputs = vec![
            Source::pattern(format!(
                "{{PROJECT_DIR}}/{EPHEMERAL_DIR}/{}",
                Artifact::FlutterLinuxLibrary.name()
            )),
            Source::pattern(format!("{{PROJECT_DIR}}/{EPHEMERAL_DIR}/{}", Artifact::IcuData.name())),
        ];
        outputs.extend(DECLARED_HEADERS.iter().map(|header| {
            Source::pattern(format!("{{PROJECT_DIR}}/{EPHEMERAL_DIR}/flutter_linux/{header}"))
        }));
        outputs
    }

    fn depfiles(&self) -> Vec<String> {
        vec![LINUX_ENGINE_DEPFILE.to_string()]
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mode = env.build_mode(self.name())?;
            let platform = env.target_platform_opt().unwrap_or(TargetPlatform::LinuxX64);
            if !platform.is_linux() {
                bail!("cannot unpack the Linux engine for {platform}");
            }

            let fs = env.file_system();
            let artifacts = env.artifacts();
            let ephemeral = env.project_dir().join(EPHEMERAL_DIR);

            let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::new();
            for artifact in [Artifact::FlutterLinuxLibrary, Artifact::IcuData] {
                let source = artifacts.artifact_path(artifact, Some(platform), Some(mode));
                pairs.push((source, ephemeral.join(artifact.name())));
            }

            let headers =
                artifacts.artifact_path(Artifact::FlutterLinuxHeaders, Some(platform), Some(mode));
            let header_files = walk_files(fs.as_ref(), &headers)
                .with_context(|| format!("listing engine headers in {:?}", headers))?;
            for file in header_files {
                let relative = file.strip_prefix(&headers)?.to_path_buf();
                pairs.push((file, ephemeral.join("flutter_linux").join(relative)));
            }

            let mut depfile = Depfile::default();
            for (source, destination) in &pairs {
                depfile.track_input(source.clone());
                depfile.track_output(destination.clone());
            }

            let copied = copy_files(Arc::clone(fs), pairs, CopyMode::Always).await?;
            info!(copied, dir = ?ephemeral, "unpacked Linux engine");

            env.depfile_service()
                .write(&depfile, &env.build_dir().join(LINUX_ENGINE_DEPFILE))
        })
    }
}

/// Assembles `flutter_assets` (and `lib/libapp.so` for AOT modes) for a
/// Linux bundle in one build mode.
#[derive(Debug, Clone)]
pub struct BundleLinuxAssets {
    mode: BuildMode,
    bundle: Arc<dyn AssetBundle>,
}

impl BundleLinuxAssets {
    pub fn new(mode: BuildMode, bundle: Arc<dyn AssetBundle>) -> Self {
        Self { mode, bundle }
    }

    pub fn debug(bundle: Arc<dyn AssetBundle>) -> Self {
        Self::new(BuildMode::Debug, bundle)
    }

    pub fn profile(bundle: Arc<dyn AssetBundle>) -> Self {
        Self::new(BuildMode::Profile, bundle)
    }

    pub fn release(bundle: Arc<dyn AssetBundle>) -> Self {
        Self::new(BuildMode::Release, bundle)
    }

    /// `<name>.d`, e.g. `debug_bundle_linux_assets.d`.
    pub fn depfile_name(&self) -> String {
        format!("{}.d", self.name())
    }
}

impl Target for BundleLinuxAssets {
    fn name(&self) -> &str {
        match self.mode {
            BuildMode::Profile => PROFILE_BUNDLE_LINUX_ASSETS,
            BuildMode::Release => RELEASE_BUNDLE_LINUX_ASSETS,
            _ => DEBUG_BUNDLE_LINUX_ASSETS,
        }
    }

    fn inputs(&self) -> Vec<Source> {
        let mut inputs = if self.mode.is_precompiled() {
            vec![Source::pattern(format!("{{BUILD_DIR}}/{APP_SO}"))]
        } else {
            vec![Source::pattern(format!("{{BUILD_DIR}}/{APP_DILL}"))]
        };
        inputs.extend(asset_inputs(&self.bundle));
        inputs
    }

    fn outputs(&self) -> Vec<Source> {
        let mut outputs = if self.mode.is_precompiled() {
            vec![Source::pattern(format!("{{OUTPUT_DIR}}/{BUNDLE_LIBAPP}"))]
        } else {
            vec![Source::pattern(format!("{{OUTPUT_DIR}}/flutter_assets/{KERNEL_BLOB}"))]
        };
        outputs.extend(asset_outputs(&self.bundle));
        outputs
    }

    fn dependencies(&self) -> Vec<Arc<dyn Target>> {
        let compile: Arc<dyn Target> = match self.mode {
            BuildMode::Profile => Arc::new(AotElf::profile()),
            BuildMode::Release => Arc::new(AotElf::release()),
            _ => Arc::new(KernelSnapshot),
        };
        vec![compile, Arc::new(UnpackLinux)]
    }

    fn depfiles(&self) -> Vec<String> {
        vec![self.depfile_name()]
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mode = env.build_mode(self.name())?;
            if mode != self.mode {
                bail!("{} cannot build a {mode} bundle", self.name());
            }

            let fs = env.file_system();
            let (source, destination) = if mode.is_precompiled() {
                (
                    env.build_dir().join(APP_SO),
                    env.output_dir().join(BUNDLE_LIBAPP),
                )
            } else {
                (env.build_dir().join(APP_DILL), assets_dir(env).join(KERNEL_BLOB))
            };
            fs.copy(&source, &destination)?;

            let mut depfile = copy_assets(env, self.bundle.as_ref()).await?;
            depfile.track_input(source);
            depfile.track_output(destination);

            env.depfile_service()
                .write(&depfile, &env.build_dir().join(self.depfile_name()))
        })
    }
}
