// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Define key selecting the build mode (`debug`, `profile`, `release`, `jit_release`).
pub const BUILD_MODE: &str = "BuildMode";

/// Define key selecting the target platform (e.g. `linux-x64`).
pub const TARGET_PLATFORM: &str = "TargetPlatform";

/// Define key naming the application entrypoint, relative to the project.
pub const TARGET_FILE: &str = "TargetFile";

/// Define key toggling the widget-creation tracking kernel transformer.
pub const TRACK_WIDGET_CREATION: &str = "TrackWidgetCreation";

/// Entry point used when `TargetFile` is not defined.
pub const DEFAULT_TARGET_FILE: &str = "lib/main.dart";

/// Compilation mode for an application bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Debug,
    Profile,
    Release,
    /// JIT snapshot with release-mode runtime flags.
    JitRelease,
}

impl BuildMode {
    pub fn cli_name(self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Profile => "profile",
            BuildMode::Release => "release",
            BuildMode::JitRelease => "jit_release",
        }
    }

    /// Whether this mode is compiled ahead of time.
    pub fn is_precompiled(self) -> bool {
        matches!(self, BuildMode::Profile | BuildMode::Release)
    }

    /// Whether the Dart VM runs in product mode.
    pub fn is_product(self) -> bool {
        matches!(self, BuildMode::Release | BuildMode::JitRelease)
    }
}

impl Default for BuildMode {
    fn default() -> Self {
        BuildMode::Debug
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(BuildMode::Debug),
            "profile" => Ok(BuildMode::Profile),
            "release" => Ok(BuildMode::Release),
            "jit_release" => Ok(BuildMode::JitRelease),
            other => Err(format!(
                "invalid build mode: {other} (expected \"debug\", \"profile\", \"release\" or \"jit_release\")"
            )),
        }
    }
}

/// Platform a bundle is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum TargetPlatform {
    #[serde(rename = "linux-x64")]
    LinuxX64,
    #[serde(rename = "linux-arm64")]
    LinuxArm64,
    #[serde(rename = "darwin")]
    Darwin,
    #[serde(rename = "windows-x64")]
    WindowsX64,
    #[serde(rename = "flutter-tester")]
    Tester,
}

impl TargetPlatform {
    pub fn cli_name(self) -> &'static str {
        match self {
            TargetPlatform::LinuxX64 => "linux-x64",
            TargetPlatform::LinuxArm64 => "linux-arm64",
            TargetPlatform::Darwin => "darwin",
            TargetPlatform::WindowsX64 => "windows-x64",
            TargetPlatform::Tester => "flutter-tester",
        }
    }

    pub fn is_linux(self) -> bool {
        matches!(self, TargetPlatform::LinuxX64 | TargetPlatform::LinuxArm64)
    }

    /// Engine cache directory name, e.g. `linux-x64` or `linux-x64-release`.
    pub fn engine_dir_name(self, mode: BuildMode) -> String {
        let base = match self {
            TargetPlatform::Darwin => "darwin-x64",
            TargetPlatform::Tester => "linux-x64",
            other => other.cli_name(),
        };
        match mode {
            BuildMode::Debug => base.to_string(),
            BuildMode::Profile => format!("{base}-profile"),
            BuildMode::Release | BuildMode::JitRelease => format!("{base}-release"),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for TargetPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linux-x64" => Ok(TargetPlatform::LinuxX64),
            "linux-arm64" => Ok(TargetPlatform::LinuxArm64),
            "darwin" | "darwin-x64" => Ok(TargetPlatform::Darwin),
            "windows-x64" => Ok(TargetPlatform::WindowsX64),
            "flutter-tester" | "tester" => Ok(TargetPlatform::Tester),
            other => Err(format!("invalid target platform: {other}")),
        }
    }
}
