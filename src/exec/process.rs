// src/exec/process.rs

//! External process invocation.
//!
//! Targets never spawn processes directly; they go through the
//! [`ProcessManager`] held by the environment so tests can substitute a fake.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::target::BoxFuture;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Run `script` through the platform shell.
    pub fn shell(script: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(script)
        } else {
            Self::new("sh").arg("-c").arg(script)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `-1` if the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external programs on behalf of targets.
pub trait ProcessManager: Send + Sync + fmt::Debug {
    /// Run `command` to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is reported through [`ProcessOutput::exit_code`], not
    /// as an error. Errors are reserved for failing to spawn or wait.
    fn run<'a>(&'a self, command: &'a ProcessCommand) -> BoxFuture<'a, Result<ProcessOutput>>;
}

/// Production process manager backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessManager;

impl ProcessManager for TokioProcessManager {
    fn run<'a>(&'a self, command: &'a ProcessCommand) -> BoxFuture<'a, Result<ProcessOutput>> {
        Box::pin(async move {
            info!(cmd = %command, "starting process");

            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(dir) = &command.working_dir {
                cmd.current_dir(dir);
            }

            let output = cmd
                .output()
                .await
                .with_context(|| format!("spawning process `{}`", command.program.display()))?;

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            for line in stderr.lines() {
                debug!(program = %command.program.display(), "stderr: {}", line);
            }

            let exit_code = output.status.code().unwrap_or(-1);
            info!(
                cmd = %command,
                exit_code,
                success = output.status.success(),
                "process exited"
            );

            Ok(ProcessOutput {
                exit_code,
                stdout,
                stderr,
            })
        })
    }
}
