// src/target.rs

//! The declaration surface for build steps.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::environment::Environment;
use crate::source::Source;

/// Boxed `Send` future, used wherever a trait method needs to be async.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named build step.
///
/// Implementations are immutable declarations: the executor may call the
/// declaration methods any number of times and expects the same answer for
/// the same environment. Names must be unique across one build graph.
pub trait Target: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Files this target reads, in declaration order.
    fn inputs(&self) -> Vec<Source>;

    /// Files this target writes. An empty list makes the target run on every
    /// invocation.
    fn outputs(&self) -> Vec<Source>;

    /// Targets that must complete successfully before this one starts.
    fn dependencies(&self) -> Vec<Arc<dyn Target>> {
        Vec::new()
    }

    /// Names of depfiles this target writes into the build directory.
    fn depfiles(&self) -> Vec<String> {
        Vec::new()
    }

    /// Perform the action. Outputs are written through `env.file_system()`.
    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>>;
}
