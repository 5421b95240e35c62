// src/source/mod.rs

//! Declarative descriptions of the files a target reads or writes.
//!
//! - [`Source::Pattern`]: `{VARIABLE}/relative/path`, optionally with one `*`
//!   in the last segment.
//! - [`Source::Artifact`]: a prebuilt engine artifact located through the
//!   environment's [`Artifacts`](crate::artifacts::Artifacts).
//! - [`Source::Behavior`]: a file list computed at resolution time.
//!
//! Resolution happens in [`visitor`].

pub mod visitor;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::artifacts::Artifact;
use crate::environment::Environment;
use crate::errors::Result;
use crate::types::{BuildMode, TargetPlatform};

pub use visitor::{SourceKind, SourceVisitor};

/// Computes a dynamic file list when it cannot be known statically.
pub trait SourceBehavior: Send + Sync + fmt::Debug {
    fn inputs(&self, env: &Environment) -> Result<Vec<PathBuf>>;
    fn outputs(&self, env: &Environment) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone)]
pub enum Source {
    Pattern {
        pattern: String,
        /// Missing files are dropped instead of making the target stale.
        optional: bool,
    },
    Artifact {
        artifact: Artifact,
        /// Overrides the environment's `TargetPlatform` define.
        platform: Option<TargetPlatform>,
        /// Overrides the environment's `BuildMode` define.
        mode: Option<BuildMode>,
    },
    Behavior(Arc<dyn SourceBehavior>),
}

impl Source {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Source::Pattern {
            pattern: pattern.into(),
            optional: false,
        }
    }

    pub fn optional_pattern(pattern: impl Into<String>) -> Self {
        Source::Pattern {
            pattern: pattern.into(),
            optional: true,
        }
    }

    pub fn artifact(artifact: Artifact) -> Self {
        Source::Artifact {
            artifact,
            platform: None,
            mode: None,
        }
    }

    pub fn artifact_for(artifact: Artifact, platform: TargetPlatform, mode: BuildMode) -> Self {
        Source::Artifact {
            artifact,
            platform: Some(platform),
            mode: Some(mode),
        }
    }

    pub fn behavior(behavior: impl SourceBehavior + 'static) -> Self {
        Source::Behavior(Arc::new(behavior))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Pattern { pattern, optional } => {
                write!(f, "{pattern}")?;
                if *optional {
                    write!(f, " (optional)")?;
                }
                Ok(())
            }
            Source::Artifact { artifact, .. } => write!(f, "artifact:{artifact}"),
            Source::Behavior(behavior) => write!(f, "behavior:{behavior:?}"),
        }
    }
}
