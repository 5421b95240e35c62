// src/config/mod.rs

//! Project configuration (`assemble.toml`).
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: reading the file from disk.
//! - [`validate`]: dependency and naming checks, run by `ConfigFile::try_from`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_optional, parse_str, DEFAULT_CONFIG_FILE};
pub use model::{BuildSection, ConfigFile, EnvironmentSection, RawConfigFile, TargetConfig};
