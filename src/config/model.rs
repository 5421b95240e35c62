// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Project configuration as read from `assemble.toml`.
///
/// ```toml
/// [environment]
/// output_dir = "build/linux/x64/debug/bundle"
///
/// [defines]
/// BuildMode = "debug"
///
/// [build]
/// max_concurrency = 4
///
/// [target.codegen]
/// cmd = "dart run build_runner build"
/// inputs = ["{PROJECT_DIR}/lib/*.dart"]
/// outputs = ["{BUILD_DIR}/codegen.stamp"]
/// depends = ["kernel_snapshot"]
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub environment: EnvironmentSection,

    /// Seed defines; `--define` on the command line overrides these.
    #[serde(default)]
    pub defines: BTreeMap<String, String>,

    #[serde(default)]
    pub build: BuildSection,

    /// Command targets from `[target.<name>]`.
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// `[environment]` section. Relative paths are resolved against the
/// directory containing the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSection {
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub flutter_root: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Defaults to the number of CPUs.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Shell command, run in the project directory.
    pub cmd: String,

    /// Input source patterns, e.g. `{PROJECT_DIR}/lib/*.dart`.
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Targets (built-in or declared here) that must succeed first.
    #[serde(default)]
    pub depends: Vec<String>,

    /// Depfiles the command writes into `BUILD_DIR`.
    #[serde(default)]
    pub depfiles: Vec<String>,
}

/// A validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)`, which runs validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub environment: EnvironmentSection,
    pub defines: BTreeMap<String, String>,
    pub build: BuildSection,
    pub target: BTreeMap<String, TargetConfig>,
    order: Vec<String>,
}

impl ConfigFile {
    /// Assemble a config without validating it. `order` must list every key
    /// of `target` with dependencies first.
    pub(crate) fn new_unchecked(
        environment: EnvironmentSection,
        defines: BTreeMap<String, String>,
        build: BuildSection,
        target: BTreeMap<String, TargetConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            environment,
            defines,
            build,
            target,
            order,
        }
    }

    /// Config target names, each after the config targets it depends on.
    pub fn target_order(&self) -> &[String] {
        &self.order
    }
}
