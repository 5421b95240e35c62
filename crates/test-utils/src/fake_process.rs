use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flutter_assemble::exec::{ProcessCommand, ProcessManager, ProcessOutput};
use flutter_assemble::fs::mock::MockFileSystem;
use flutter_assemble::fs::FileSystem;
use flutter_assemble::target::BoxFuture;

/// Canned reaction of a fake program.
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Files written into the mock file system when the program "runs".
    pub writes: Vec<(PathBuf, Vec<u8>)>,
}

impl FakeResponse {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.to_string(),
            ..Self::default()
        }
    }

    pub fn writes(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.writes.push((path.into(), contents.into()));
        self
    }
}

/// A fake process manager that:
/// - records every command it is asked to run
/// - answers by program file name (`dart`, `gen_snapshot`, `sh`, ...)
/// - applies the response's file writes to a [`MockFileSystem`]
///
/// Programs without a registered response exit successfully and write
/// nothing.
#[derive(Debug, Clone)]
pub struct FakeProcessManager {
    fs: MockFileSystem,
    responses: Arc<Mutex<HashMap<String, FakeResponse>>>,
    commands: Arc<Mutex<Vec<ProcessCommand>>>,
}

impl FakeProcessManager {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            responses: Arc::new(Mutex::new(HashMap::new())),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register the response for a program, replacing any earlier one.
    pub fn on(&self, program: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(program.to_string(), response);
    }

    pub fn commands(&self) -> Vec<ProcessCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// How many times a program with this file name was run.
    pub fn run_count(&self, program: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| program_name(c) == program)
            .count()
    }
}

fn program_name(command: &ProcessCommand) -> String {
    command
        .program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ProcessManager for FakeProcessManager {
    fn run<'a>(
        &'a self,
        command: &'a ProcessCommand,
    ) -> BoxFuture<'a, anyhow::Result<ProcessOutput>> {
        Box::pin(async move {
            self.commands.lock().unwrap().push(command.clone());

            let response = self
                .responses
                .lock()
                .unwrap()
                .get(&program_name(command))
                .cloned()
                .unwrap_or_default();

            for (path, contents) in &response.writes {
                self.fs.write(path, contents)?;
            }

            Ok(ProcessOutput {
                exit_code: response.exit_code,
                stdout: response.stdout,
                stderr: response.stderr,
            })
        })
    }
}
