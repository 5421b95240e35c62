// src/depfile.rs

//! Make-style depfiles.
//!
//! A depfile records the inputs a tool actually read and the outputs it
//! actually wrote, in the syntax understood by Ninja and emitted by most
//! compilers:
//!
//! ```text
//! output_1 output_2: input_1 input_2
//! ```
//!
//! Spaces inside paths are escaped as `\ `, backslashes as `\\`, `#` as
//! `\#` and `$` as `$$`. A backslash at the end of a line continues the
//! rule on the next line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

use crate::fs::FileSystem;

#[derive(Error, Debug)]
pub enum DepfileError {
    #[error("malformed depfile: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Extra inputs and outputs discovered while a target ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depfile {
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
}

impl Depfile {
    pub fn new(inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Self {
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Declare that the tool reads this path.
    pub fn track_input(&mut self, input: impl Into<PathBuf>) {
        self.inputs.push(input.into())
    }

    /// Declare that the tool writes this path.
    pub fn track_output(&mut self, output: impl Into<PathBuf>) {
        self.outputs.push(output.into())
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Append another depfile's entries, skipping paths already present.
    pub fn merge(&mut self, other: &Depfile) {
        for input in &other.inputs {
            if !self.inputs.contains(input) {
                self.inputs.push(input.clone());
            }
        }
        for output in &other.outputs {
            if !self.outputs.contains(output) {
                self.outputs.push(output.clone());
            }
        }
    }
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(' ', "\\ ")
        .replace('#', "\\#")
        .replace('$', "$$")
}

impl fmt::Display for Depfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outputs: Vec<String> = self.outputs.iter().map(|p| escape_path(p)).collect();
        let inputs: Vec<String> = self.inputs.iter().map(|p| escape_path(p)).collect();
        write!(f, "{}: {}", outputs.join(" "), inputs.join(" "))
    }
}

impl FromStr for Depfile {
    type Err = DepfileError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let joined = contents.replace("\\\r\n", " ").replace("\\\n", " ");

        let mut depfile = Depfile::default();
        let mut rules = 0;

        for line in joined.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (outputs, inputs) = split_rule(line)
                .ok_or_else(|| DepfileError::Malformed(format!("missing `: ` separator in `{line}`")))?;
            depfile.outputs.extend(split_paths(outputs));
            depfile.inputs.extend(split_paths(inputs));
            rules += 1;
        }

        if rules == 0 {
            return Err(DepfileError::Malformed("no rules found".to_string()));
        }

        Ok(depfile)
    }
}

/// Split a rule at the first unescaped `:` that is followed by whitespace or
/// the end of the line. Drive letters such as `C:\` are left alone.
fn split_rule(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b':' => {
                let next = bytes.get(i + 1);
                if next.is_none() || next.is_some_and(|c| c.is_ascii_whitespace()) {
                    return Some((&line[..i], &line[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on unescaped whitespace and undo `\ `, `\\`, `\#` and `$$` escapes.
fn split_paths(list: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(next) if matches!(next, ' ' | '\\' | '#') => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            '$' if chars.peek() == Some(&'$') => {
                current.push('$');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    paths.push(PathBuf::from(std::mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(PathBuf::from(current));
    }
    paths
}

/// Reads and writes depfiles through the injected [`FileSystem`].
#[derive(Debug, Clone)]
pub struct DepfileService {
    fs: Arc<dyn FileSystem>,
}

impl DepfileService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Parse the depfile at `path`.
    ///
    /// Relative entries are resolved against the depfile's directory.
    pub fn parse(&self, path: &Path) -> Result<Depfile, DepfileError> {
        let contents = self
            .fs
            .read_to_string(path)
            .with_context(|| format!("reading depfile {:?}", path))?;
        let mut depfile: Depfile = contents.parse()?;

        if let Some(base) = path.parent() {
            for p in depfile.inputs.iter_mut().chain(depfile.outputs.iter_mut()) {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }

        debug!(
            path = ?path,
            inputs = depfile.inputs.len(),
            outputs = depfile.outputs.len(),
            "parsed depfile"
        );
        Ok(depfile)
    }

    /// Overwrite `path` with the serialized depfile.
    pub fn write(&self, depfile: &Depfile, path: &Path) -> anyhow::Result<()> {
        let contents = format!("{depfile}\n");
        self.fs
            .write(path, contents.as_bytes())
            .with_context(|| format!("writing depfile {:?}", path))
    }
}
