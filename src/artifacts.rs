// src/artifacts.rs

//! Locating prebuilt engine and tool artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::{BuildMode, TargetPlatform};

/// Prebuilt artifacts consumed by the build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// `libflutter_linux_gtk.so`
    FlutterLinuxLibrary,
    /// The `flutter_linux` public headers directory.
    FlutterLinuxHeaders,
    /// `icudtl.dat`
    IcuData,
    /// The Dart VM binary shipped with the SDK.
    EngineDartBinary,
    /// Snapshot of the kernel compiler (`frontend_server`).
    FrontendServerSnapshot,
    /// Patched Dart SDK used as `--sdk-root` by the kernel compiler.
    FlutterPatchedSdkPath,
    /// `platform_strong.dill` inside the patched SDK.
    PlatformKernelDill,
    /// AOT snapshot generator.
    GenSnapshot,
}

impl Artifact {
    pub fn name(self) -> &'static str {
        match self {
            Artifact::FlutterLinuxLibrary => "libflutter_linux_gtk.so",
            Artifact::FlutterLinuxHeaders => "flutter_linux",
            Artifact::IcuData => "icudtl.dat",
            Artifact::EngineDartBinary => "dart",
            Artifact::FrontendServerSnapshot => "frontend_server_aot.dart.snapshot",
            Artifact::FlutterPatchedSdkPath => "flutter_patched_sdk",
            Artifact::PlatformKernelDill => "platform_strong.dill",
            Artifact::GenSnapshot => "gen_snapshot",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves artifact locations.
pub trait Artifacts: Send + Sync + fmt::Debug {
    fn artifact_path(
        &self,
        artifact: Artifact,
        platform: Option<TargetPlatform>,
        mode: Option<BuildMode>,
    ) -> PathBuf;
}

/// Artifacts downloaded into `<flutter_root>/bin/cache`.
///
/// Engine artifacts live under
/// `bin/cache/artifacts/engine/<platform>[-<mode>]`; Dart SDK tools under
/// `bin/cache/dart-sdk`.
#[derive(Debug, Clone)]
pub struct CachedArtifacts {
    cache_dir: PathBuf,
}

impl CachedArtifacts {
    pub fn new(flutter_root: &Path) -> Self {
        Self {
            cache_dir: flutter_root.join("bin").join("cache"),
        }
    }

    /// Use an explicit cache directory instead of `<flutter_root>/bin/cache`.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn engine_dir(&self) -> PathBuf {
        self.cache_dir.join("artifacts").join("engine")
    }

    fn dart_sdk_dir(&self) -> PathBuf {
        self.cache_dir.join("dart-sdk")
    }

    fn patched_sdk(&self, mode: BuildMode) -> PathBuf {
        let name = if mode.is_product() {
            "flutter_patched_sdk_product"
        } else {
            "flutter_patched_sdk"
        };
        self.engine_dir().join("common").join(name)
    }
}

impl Artifacts for CachedArtifacts {
    fn artifact_path(
        &self,
        artifact: Artifact,
        platform: Option<TargetPlatform>,
        mode: Option<BuildMode>,
    ) -> PathBuf {
        let platform = platform.unwrap_or(TargetPlatform::LinuxX64);
        let mode = mode.unwrap_or_default();

        match artifact {
            Artifact::FlutterLinuxLibrary | Artifact::FlutterLinuxHeaders => self
                .engine_dir()
                .join(platform.engine_dir_name(mode))
                .join(artifact.name()),
            // ICU data is identical across modes.
            Artifact::IcuData => self
                .engine_dir()
                .join(platform.engine_dir_name(BuildMode::Debug))
                .join(artifact.name()),
            Artifact::GenSnapshot => self
                .engine_dir()
                .join(platform.engine_dir_name(mode))
                .join(artifact.name()),
            Artifact::EngineDartBinary => self.dart_sdk_dir().join("bin").join(artifact.name()),
            Artifact::FrontendServerSnapshot => self
                .dart_sdk_dir()
                .join("bin")
                .join("snapshots")
                .join(artifact.name()),
            Artifact::FlutterPatchedSdkPath => self.patched_sdk(mode),
            Artifact::PlatformKernelDill => self.patched_sdk(mode).join(artifact.name()),
        }
    }
}
