// src/environment.rs

//! The resolved directories, defines, and collaborators a build runs against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use blake3::Hasher;

use crate::artifacts::{Artifacts, CachedArtifacts};
use crate::depfile::DepfileService;
use crate::errors::{BuildError, Result};
use crate::exec::{ProcessManager, TokioProcessManager};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{BuildMode, TargetPlatform, BUILD_MODE, TARGET_PLATFORM};

pub const PROJECT_DIR: &str = "PROJECT_DIR";
pub const BUILD_DIR: &str = "BUILD_DIR";
pub const OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const FLUTTER_ROOT: &str = "FLUTTER_ROOT";
pub const CACHE_DIR: &str = "CACHE_DIR";

/// Read-only bundle shared by every target of one build invocation.
#[derive(Debug, Clone)]
pub struct Environment {
    project_dir: PathBuf,
    build_dir: PathBuf,
    output_dir: PathBuf,
    flutter_root: PathBuf,
    cache_dir: PathBuf,
    defines: BTreeMap<String, String>,
    file_system: Arc<dyn FileSystem>,
    artifacts: Arc<dyn Artifacts>,
    process_manager: Arc<dyn ProcessManager>,
}

impl Environment {
    pub fn builder(project_dir: impl Into<PathBuf>) -> EnvironmentBuilder {
        EnvironmentBuilder::new(project_dir)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn flutter_root(&self) -> &Path {
        &self.flutter_root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    pub fn artifacts(&self) -> &dyn Artifacts {
        self.artifacts.as_ref()
    }

    pub fn process_manager(&self) -> &dyn ProcessManager {
        self.process_manager.as_ref()
    }

    pub fn depfile_service(&self) -> DepfileService {
        DepfileService::new(Arc::clone(&self.file_system))
    }

    /// Directory bound to a `{NAME}` source pattern variable.
    pub fn variable(&self, name: &str) -> Option<&Path> {
        match name {
            PROJECT_DIR => Some(&self.project_dir),
            BUILD_DIR => Some(&self.build_dir),
            OUTPUT_DIR => Some(&self.output_dir),
            FLUTTER_ROOT => Some(&self.flutter_root),
            CACHE_DIR => Some(&self.cache_dir),
            _ => None,
        }
    }

    pub fn define(&self, key: &str) -> Option<&str> {
        self.defines.get(key).map(String::as_str)
    }

    /// Look up a define that `target` cannot build without.
    pub fn require_define(&self, target: &str, key: &str) -> Result<&str> {
        self.define(key).ok_or_else(|| BuildError::MissingDefine {
            target: target.to_string(),
            define: key.to_string(),
        })
    }

    /// The `BuildMode` define, required by `target`.
    pub fn build_mode(&self, target: &str) -> Result<BuildMode> {
        let value = self.require_define(target, BUILD_MODE)?;
        value.parse().map_err(|_| BuildError::InvalidDefine {
            define: BUILD_MODE.to_string(),
            value: value.to_string(),
        })
    }

    /// The `TargetPlatform` define, required by `target`.
    pub fn target_platform(&self, target: &str) -> Result<TargetPlatform> {
        let value = self.require_define(target, TARGET_PLATFORM)?;
        value.parse().map_err(|_| BuildError::InvalidDefine {
            define: TARGET_PLATFORM.to_string(),
            value: value.to_string(),
        })
    }

    /// Build mode if defined and valid; used where the define is optional.
    pub fn build_mode_opt(&self) -> Option<BuildMode> {
        self.define(BUILD_MODE).and_then(|v| v.parse().ok())
    }

    /// Target platform if defined and valid; used where the define is optional.
    pub fn target_platform_opt(&self) -> Option<TargetPlatform> {
        self.define(TARGET_PLATFORM).and_then(|v| v.parse().ok())
    }

    /// Create the build and output directories if they do not exist yet.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.build_dir, &self.output_dir] {
            self.file_system
                .create_dir_all(dir)
                .with_context(|| format!("creating directory {:?}", dir))?;
        }
        Ok(())
    }
}

/// Build directory for a define set: `<project>/.dart_tool/flutter_build/<hash>`.
///
/// The hash covers the sorted defines, so builds with different modes or
/// platforms never share stamps.
pub fn default_build_dir(project_dir: &Path, defines: &BTreeMap<String, String>) -> PathBuf {
    let mut hasher = Hasher::new();
    for (key, value) in defines {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize().to_hex();
    project_dir
        .join(".dart_tool")
        .join("flutter_build")
        .join(&digest.as_str()[..32])
}

#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    project_dir: PathBuf,
    build_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    flutter_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    defines: BTreeMap<String, String>,
    file_system: Option<Arc<dyn FileSystem>>,
    artifacts: Option<Arc<dyn Artifacts>>,
    process_manager: Option<Arc<dyn ProcessManager>>,
}

impl EnvironmentBuilder {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            build_dir: None,
            output_dir: None,
            flutter_root: None,
            cache_dir: None,
            defines: BTreeMap::new(),
            file_system: None,
            artifacts: None,
            process_manager: None,
        }
    }

    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(dir.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn flutter_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.flutter_root = Some(dir.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn define(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.insert(key.into(), value.into());
        self
    }

    pub fn defines<I, K, V>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.defines
            .extend(defines.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn Artifacts>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn process_manager(mut self, process_manager: Arc<dyn ProcessManager>) -> Self {
        self.process_manager = Some(process_manager);
        self
    }

    /// Fill in defaults:
    ///
    /// - build dir: [`default_build_dir`]
    /// - output dir: `<project>/build`
    /// - flutter root: the project dir
    /// - cache dir: `<flutter_root>/bin/cache`
    /// - collaborators: real file system, cached artifacts, tokio processes
    pub fn build(self) -> Environment {
        let project_dir = self.project_dir;
        let build_dir = self
            .build_dir
            .unwrap_or_else(|| default_build_dir(&project_dir, &self.defines));
        let output_dir = self.output_dir.unwrap_or_else(|| project_dir.join("build"));
        let flutter_root = self.flutter_root.unwrap_or_else(|| project_dir.clone());
        let cache_dir = self
            .cache_dir
            .unwrap_or_else(|| flutter_root.join("bin").join("cache"));
        let artifacts = self
            .artifacts
            .unwrap_or_else(|| Arc::new(CachedArtifacts::with_cache_dir(cache_dir.clone())));

        Environment {
            project_dir,
            build_dir,
            output_dir,
            flutter_root,
            cache_dir,
            defines: self.defines,
            file_system: self.file_system.unwrap_or_else(|| Arc::new(RealFileSystem)),
            artifacts,
            process_manager: self
                .process_manager
                .unwrap_or_else(|| Arc::new(TokioProcessManager)),
        }
    }
}
