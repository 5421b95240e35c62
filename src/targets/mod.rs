// src/targets/mod.rs

//! Concrete build targets and the registry that names them.
//!
//! - [`common`]: `kernel_snapshot`, `aot_elf_profile`, `aot_elf_release`.
//! - [`linux`]: `unpack_linux` and the `*_bundle_linux_assets` targets.
//! - [`assets`]: `copy_assets` plus the asset bundle collaborator.
//! - [`command`]: shell-command targets from the project config.

pub mod assets;
pub mod command;
pub mod common;
pub mod linux;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{BuildError, Result};
use crate::target::Target;

pub use assets::{AssetBundle, AssetsBehavior, CopyAssets, PubspecAssetBundle};
pub use command::{register_command_targets, CommandTarget};
pub use common::{AotElf, KernelSnapshot};
pub use linux::{BundleLinuxAssets, UnpackLinux};

pub const KERNEL_SNAPSHOT: &str = "kernel_snapshot";
pub const AOT_ELF_PROFILE: &str = "aot_elf_profile";
pub const AOT_ELF_RELEASE: &str = "aot_elf_release";
pub const UNPACK_LINUX: &str = "unpack_linux";
pub const COPY_ASSETS: &str = "copy_assets";
pub const DEBUG_BUNDLE_LINUX_ASSETS: &str = "debug_bundle_linux_assets";
pub const PROFILE_BUNDLE_LINUX_ASSETS: &str = "profile_bundle_linux_assets";
pub const RELEASE_BUNDLE_LINUX_ASSETS: &str = "release_bundle_linux_assets";

/// Names reserved by the built-in targets.
pub const BUILTIN_TARGETS: [&str; 8] = [
    KERNEL_SNAPSHOT,
    AOT_ELF_PROFILE,
    AOT_ELF_RELEASE,
    UNPACK_LINUX,
    COPY_ASSETS,
    DEBUG_BUNDLE_LINUX_ASSETS,
    PROFILE_BUNDLE_LINUX_ASSETS,
    RELEASE_BUNDLE_LINUX_ASSETS,
];

/// Name-to-target lookup used by the CLI to turn arguments into roots.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Arc<dyn Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in target, using `bundle` for assets.
    pub fn with_builtin(bundle: Arc<dyn AssetBundle>) -> Self {
        let builtin: Vec<Arc<dyn Target>> = vec![
            Arc::new(KernelSnapshot),
            Arc::new(AotElf::profile()),
            Arc::new(AotElf::release()),
            Arc::new(UnpackLinux),
            Arc::new(CopyAssets::new(Arc::clone(&bundle))),
            Arc::new(BundleLinuxAssets::debug(Arc::clone(&bundle))),
            Arc::new(BundleLinuxAssets::profile(Arc::clone(&bundle))),
            Arc::new(BundleLinuxAssets::release(bundle)),
        ];

        let mut registry = Self::new();
        for target in builtin {
            registry
                .targets
                .insert(target.name().to_string(), target);
        }
        registry
    }

    pub fn register(&mut self, target: Arc<dyn Target>) -> Result<()> {
        let name = target.name().to_string();
        if self.targets.contains_key(&name) {
            return Err(BuildError::DuplicateTarget(name));
        }
        self.targets.insert(name, target);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Target>> {
        self.targets
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::TargetNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }
}
