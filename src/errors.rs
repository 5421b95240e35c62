// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Configuration-class errors (`UnresolvedVariable`, `InvalidPattern`,
//! `CyclicDependency`, `MissingDefine`) are raised before a target's action
//! runs. `BuildFailure` wraps whatever the action itself returned.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Unresolved variable `{variable}` in source pattern `{pattern}`")]
    UnresolvedVariable { variable: String, pattern: String },

    #[error("Invalid source pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Target `{target}` requires define `{define}`, which was not provided")]
    MissingDefine { target: String, define: String },

    #[error("Invalid value `{value}` for define `{define}`")]
    InvalidDefine { define: String, value: String },

    #[error("Target `{target}` failed: {source:#}")]
    BuildFailure {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Name of the target this error is attributed to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            BuildError::MissingDefine { target, .. } | BuildError::BuildFailure { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Attribute an arbitrary action error to `target`.
    ///
    /// Errors that already carry their own classification (a missing define,
    /// an unresolved pattern) keep it; everything else becomes a
    /// `BuildFailure`.
    pub fn from_action(target: &str, err: anyhow::Error) -> Self {
        match err.downcast::<BuildError>() {
            Ok(
                e @ (BuildError::MissingDefine { .. }
                | BuildError::UnresolvedVariable { .. }
                | BuildError::InvalidPattern { .. }
                | BuildError::BuildFailure { .. }),
            ) => e,
            Ok(other) => BuildError::BuildFailure {
                target: target.to_string(),
                source: other.into(),
            },
            Err(err) => BuildError::BuildFailure {
                target: target.to_string(),
                source: err,
            },
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
