// src/source/visitor.rs

//! Resolution of [`Source`] descriptors into concrete file paths.

use std::path::{Path, PathBuf};

use globset::Glob;
use tracing::trace;

use crate::environment::Environment;
use crate::errors::{BuildError, Result};
use crate::fs::walk_files;
use crate::source::Source;

/// Which side of a target is being resolved; behaviors answer differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Inputs,
    Outputs,
}

/// Collects the files denoted by a list of sources, in order.
///
/// Nothing is de-duplicated. Directory artifacts expand to every file
/// beneath them.
#[derive(Debug)]
pub struct SourceVisitor<'a> {
    env: &'a Environment,
    kind: SourceKind,
    sources: Vec<PathBuf>,
}

impl<'a> SourceVisitor<'a> {
    pub fn new(env: &'a Environment, kind: SourceKind) -> Self {
        Self {
            env,
            kind,
            sources: Vec::new(),
        }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<PathBuf> {
        self.sources
    }

    pub fn visit_all(&mut self, sources: &[Source]) -> Result<()> {
        for source in sources {
            self.visit(source)?;
        }
        Ok(())
    }

    pub fn visit(&mut self, source: &Source) -> Result<()> {
        match source {
            Source::Pattern { pattern, optional } => self.visit_pattern(pattern, *optional),
            Source::Artifact {
                artifact,
                platform,
                mode,
            } => {
                let platform = platform.or_else(|| self.env.target_platform_opt());
                let mode = mode.or_else(|| self.env.build_mode_opt());
                let path = self.env.artifacts().artifact_path(*artifact, platform, mode);
                self.visit_path(path)
            }
            Source::Behavior(behavior) => {
                let files = match self.kind {
                    SourceKind::Inputs => behavior.inputs(self.env)?,
                    SourceKind::Outputs => behavior.outputs(self.env)?,
                };
                trace!(count = files.len(), behavior = ?behavior, "resolved behavior source");
                self.sources.extend(files);
                Ok(())
            }
        }
    }

    fn visit_pattern(&mut self, pattern: &str, optional: bool) -> Result<()> {
        let path = resolve_pattern(self.env, pattern)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name.contains('*') {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let matched = expand_wildcard(self.env, pattern, dir, &file_name)?;
            trace!(pattern, count = matched.len(), "expanded wildcard pattern");
            self.sources.extend(matched);
            return Ok(());
        }

        if optional && !self.env.file_system().exists(&path) {
            trace!(pattern, "optional source missing; skipping");
            return Ok(());
        }

        self.sources.push(path);
        Ok(())
    }

    fn visit_path(&mut self, path: PathBuf) -> Result<()> {
        let fs = self.env.file_system();
        if fs.is_dir(&path) {
            let files = walk_files(fs.as_ref(), &path)?;
            self.sources.extend(files);
        } else {
            self.sources.push(path);
        }
        Ok(())
    }
}

/// Substitute the leading `{VARIABLE}` of `pattern` and validate wildcard
/// placement. The returned path may still contain a `*` in its last segment.
pub fn resolve_pattern(env: &Environment, pattern: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| BuildError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let rest = pattern
        .strip_prefix('{')
        .ok_or_else(|| invalid("must start with a `{VARIABLE}` root"))?;
    let (variable, relative) = rest
        .split_once('}')
        .ok_or_else(|| invalid("unterminated `{` in variable root"))?;

    let root = env
        .variable(variable)
        .ok_or_else(|| BuildError::UnresolvedVariable {
            variable: variable.to_string(),
            pattern: pattern.to_string(),
        })?;

    let relative = relative.trim_start_matches(['/', '\\']);
    let wildcards = relative.matches('*').count();
    if wildcards > 1 {
        return Err(invalid("at most one `*` wildcard is allowed"));
    }
    if wildcards == 1 {
        let last = relative.rsplit(['/', '\\']).next().unwrap_or(relative);
        if !last.contains('*') {
            return Err(invalid("a `*` wildcard is only allowed in the last path segment"));
        }
    }

    if relative.is_empty() {
        Ok(root.to_path_buf())
    } else {
        Ok(root.join(relative))
    }
}

fn expand_wildcard(
    env: &Environment,
    pattern: &str,
    dir: &Path,
    file_glob: &str,
) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(file_glob)
        .map_err(|e| BuildError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?
        .compile_matcher();

    let fs = env.file_system();
    if !fs.is_dir(dir) {
        return Ok(Vec::new());
    }

    let mut matched: Vec<PathBuf> = fs
        .read_dir(dir)?
        .into_iter()
        .filter(|entry| fs.is_file(entry))
        .filter(|entry| {
            entry
                .file_name()
                .is_some_and(|name| matcher.is_match(Path::new(name)))
        })
        .collect();
    matched.sort();
    Ok(matched)
}
