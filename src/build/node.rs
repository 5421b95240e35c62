// src/build/node.rs

//! Per-target resolution, staleness checks, and post-build bookkeeping.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::depfile::DepfileError;
use crate::environment::Environment;
use crate::errors::Result;
use crate::manifest::{BuildStamp, HashManifest};
use crate::source::{SourceKind, SourceVisitor};
use crate::target::Target;

/// Concrete files of a target for one invocation: declared sources plus
/// depfile entries.
#[derive(Debug, Clone, Default)]
pub struct ResolvedNode {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Declared depfiles that were absent or could not be parsed.
    pub missing_depfiles: Vec<PathBuf>,
}

/// Why a target has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    NoOutputs,
    NeverBuilt,
    MissingDepfile(PathBuf),
    MissingInput(PathBuf),
    MissingOutput(PathBuf),
    InputChanged(PathBuf),
    OutputChanged(PathBuf),
    InputSetChanged,
    OutputSetChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoOutputs => write!(f, "declares no outputs"),
            StaleReason::NeverBuilt => write!(f, "never built"),
            StaleReason::MissingDepfile(p) => write!(f, "depfile missing or malformed: {}", p.display()),
            StaleReason::MissingInput(p) => write!(f, "input missing: {}", p.display()),
            StaleReason::MissingOutput(p) => write!(f, "output missing: {}", p.display()),
            StaleReason::InputChanged(p) => write!(f, "input changed: {}", p.display()),
            StaleReason::OutputChanged(p) => write!(f, "output changed: {}", p.display()),
            StaleReason::InputSetChanged => write!(f, "set of inputs changed"),
            StaleReason::OutputSetChanged => write!(f, "set of outputs changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(Vec<StaleReason>),
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale(_))
    }
}

/// Resolve declared sources and read back the target's depfiles.
pub fn resolve_node(target: &dyn Target, env: &Environment) -> Result<ResolvedNode> {
    let mut inputs = SourceVisitor::new(env, SourceKind::Inputs);
    inputs.visit_all(&target.inputs())?;
    let mut outputs = SourceVisitor::new(env, SourceKind::Outputs);
    outputs.visit_all(&target.outputs())?;

    let mut node = ResolvedNode {
        inputs: inputs.into_sources(),
        outputs: outputs.into_sources(),
        missing_depfiles: Vec::new(),
    };

    let service = env.depfile_service();
    for name in target.depfiles() {
        let path = env.build_dir().join(&name);
        if !env.file_system().is_file(&path) {
            debug!(name = %target.name(), depfile = ?path, "depfile not present");
            node.missing_depfiles.push(path);
            continue;
        }
        match service.parse(&path) {
            Ok(depfile) => {
                node.inputs.extend_from_slice(depfile.inputs());
                node.outputs.extend_from_slice(depfile.outputs());
            }
            Err(DepfileError::Malformed(reason)) => {
                warn!(name = %target.name(), depfile = ?path, %reason, "ignoring malformed depfile");
                node.missing_depfiles.push(path);
            }
            Err(DepfileError::Io(err)) => {
                warn!(name = %target.name(), depfile = ?path, error = %err, "failed to read depfile");
                node.missing_depfiles.push(path);
            }
        }
    }

    Ok(node)
}

/// Compare a resolved node against the previous manifest snapshot.
///
/// Every input and output that exists is fingerprinted into the manifest's
/// current table as a side effect, so a later [`record_build`] reuses the
/// hashes.
pub fn check_node(
    target: &dyn Target,
    node: &ResolvedNode,
    env: &Environment,
    manifest: &HashManifest,
) -> Result<Freshness> {
    let fs = env.file_system().as_ref();
    let name = target.name();
    let mut reasons = Vec::new();

    if target.outputs().is_empty() {
        reasons.push(StaleReason::NoOutputs);
    }

    let stamp = manifest.previous_stamp(name);
    if stamp.is_none() {
        reasons.push(StaleReason::NeverBuilt);
    }

    for path in &node.missing_depfiles {
        reasons.push(StaleReason::MissingDepfile(path.clone()));
    }

    for input in &node.inputs {
        if !fs.is_file(input) {
            reasons.push(StaleReason::MissingInput(input.clone()));
            continue;
        }
        if changed(manifest, env, input)? {
            reasons.push(StaleReason::InputChanged(input.clone()));
        }
    }

    for output in &node.outputs {
        if !fs.is_file(output) {
            reasons.push(StaleReason::MissingOutput(output.clone()));
            continue;
        }
        if changed(manifest, env, output)? {
            reasons.push(StaleReason::OutputChanged(output.clone()));
        }
    }

    if let Some(stamp) = stamp {
        let current: BTreeSet<&Path> = node.inputs.iter().map(PathBuf::as_path).collect();
        let previous: BTreeSet<&Path> = stamp.inputs.iter().map(PathBuf::as_path).collect();
        if current != previous {
            reasons.push(StaleReason::InputSetChanged);
        }
        let current: BTreeSet<&Path> = node.outputs.iter().map(PathBuf::as_path).collect();
        let previous: BTreeSet<&Path> = stamp.outputs.iter().map(PathBuf::as_path).collect();
        if current != previous {
            reasons.push(StaleReason::OutputSetChanged);
        }
    }

    if reasons.is_empty() {
        Ok(Freshness::Fresh)
    } else {
        Ok(Freshness::Stale(reasons))
    }
}

fn changed(manifest: &HashManifest, env: &Environment, path: &Path) -> Result<bool> {
    let current = manifest.fingerprint(env.file_system().as_ref(), path)?;
    Ok(match manifest.previous_fingerprint(path) {
        Some(previous) => previous.hash != current.hash,
        None => true,
    })
}

/// After a successful action: re-resolve, fingerprint, delete orphaned
/// outputs, and record a new stamp. Returns the resolved node.
pub fn record_build(
    target: &dyn Target,
    env: &Environment,
    manifest: &HashManifest,
) -> Result<ResolvedNode> {
    let fs = env.file_system().as_ref();
    let name = target.name();
    let node = resolve_node(target, env)?;

    for input in &node.inputs {
        if fs.is_file(input) {
            manifest.fingerprint(fs, input)?;
        }
    }
    for output in &node.outputs {
        if fs.is_file(output) {
            manifest.refresh(fs, output)?;
        } else {
            warn!(name = %name, output = ?output, "declared output was not produced");
        }
    }

    let outputs: BTreeSet<PathBuf> = node.outputs.iter().cloned().collect();
    if let Some(previous) = manifest.previous_stamp(name) {
        for orphan in previous.outputs.iter().filter(|p| !outputs.contains(*p)) {
            if fs.is_file(orphan) {
                info!(name = %name, path = ?orphan, "deleting output no longer produced");
                fs.remove_file(orphan)?;
            }
        }
    }

    let inputs: BTreeSet<PathBuf> = node.inputs.iter().cloned().collect();
    manifest.record_stamp(
        name,
        BuildStamp {
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        },
    );

    Ok(node)
}
