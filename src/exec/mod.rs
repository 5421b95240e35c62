// src/exec/mod.rs

//! Side-effecting helpers used by target actions.
//!
//! - [`process`]: the [`ProcessManager`] abstraction for external tools.
//! - [`copy`]: bounded-concurrency file copies.

pub mod copy;
pub mod process;

pub use copy::{copy_files, CopyMode, MAX_OPEN_FILES};
pub use process::{ProcessCommand, ProcessManager, ProcessOutput, TokioProcessManager};
