// src/build/mod.rs

//! The build graph executor.
//!
//! - [`graph`] resolves the dependency closure and detects cycles.
//! - [`node`] decides whether a target is stale and records finished builds.
//! - [`scheduler`] hands out targets whose dependencies have succeeded.
//!
//! [`BuildSystem::build_all`] ties them together: the closure is resolved,
//! ready targets are checked and executed on a `JoinSet` (at most
//! `max_concurrency` at once), and the hash manifest is flushed only when
//! every target succeeded. A failure blocks the failed target's dependents;
//! targets that do not depend on it still run, so one invocation reports
//! every independent failure.

pub mod graph;
pub mod node;
pub mod scheduler;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::depfile::Depfile;
use crate::environment::Environment;
use crate::errors::{BuildError, Result};
use crate::manifest::HashManifest;
use crate::target::Target;

pub use graph::TargetGraph;
pub use node::{Freshness, ResolvedNode, StaleReason};
pub use scheduler::{NodeState, Scheduler};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of targets executing at once. `1` runs strictly in
    /// dependency post-order.
    pub max_concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Final state of one target in a build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// The action ran and succeeded.
    Built,
    /// Fresh; the action was skipped.
    UpToDate,
    Failed,
    /// Not executed because a dependency failed.
    Blocked,
}

/// A target whose check or action failed.
#[derive(Debug)]
pub struct TargetFailure {
    pub target: String,
    pub error: BuildError,
}

#[derive(Debug, Clone)]
pub struct PerformanceMeasurement {
    pub target: String,
    pub skipped: bool,
    pub succeeded: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub success: bool,
    /// One entry per failed target, in completion order. More than one entry
    /// is possible when targets were running concurrently.
    pub failures: Vec<TargetFailure>,
    pub statuses: BTreeMap<String, TargetStatus>,
    pub performance: BTreeMap<String, PerformanceMeasurement>,
    /// Every file read by the build that no target of this build produced.
    pub input_files: Vec<PathBuf>,
    /// Every file produced by the build.
    pub output_files: Vec<PathBuf>,
}

impl BuildResult {
    pub fn status(&self, target: &str) -> Option<TargetStatus> {
        self.statuses.get(target).copied()
    }

    /// Names of the targets whose actions failed.
    pub fn failed_targets(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.target.as_str()).collect()
    }

    /// Names of the targets whose actions actually ran.
    pub fn built_targets(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == TargetStatus::Built)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Aggregate depfile of the whole invocation.
    pub fn depfile(&self) -> Depfile {
        Depfile::new(self.input_files.clone(), self.output_files.clone())
    }
}

/// What a node task reports back to the executor loop.
#[derive(Debug)]
struct NodeReport {
    skipped: bool,
    node: ResolvedNode,
    elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct BuildSystem {
    options: BuildOptions,
}

impl BuildSystem {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Resolve the execution order without running anything.
    pub fn plan(&self, targets: &[Arc<dyn Target>]) -> Result<TargetGraph> {
        TargetGraph::resolve_all(targets)
    }

    pub async fn build(&self, target: Arc<dyn Target>, env: &Environment) -> Result<BuildResult> {
        self.build_all(&[target], env).await
    }

    /// Build every target in `targets` and their transitive dependencies.
    ///
    /// Returns `Err` only for configuration-class problems detected before any
    /// action runs (a dependency cycle, an uncreatable build directory) or
    /// when the manifest cannot be flushed. Target failures are reported
    /// through [`BuildResult::failures`].
    pub async fn build_all(
        &self,
        targets: &[Arc<dyn Target>],
        env: &Environment,
    ) -> Result<BuildResult> {
        let graph = TargetGraph::resolve_all(targets)?;
        env.ensure_directories()?;

        let env = Arc::new(env.clone());
        let fs = Arc::clone(env.file_system());
        let manifest = Arc::new(HashManifest::load(fs.as_ref(), env.build_dir()));
        let max_concurrency = self.options.max_concurrency.max(1);

        info!(
            targets = graph.len(),
            max_concurrency,
            build_dir = ?env.build_dir(),
            "starting build"
        );

        let mut scheduler = Scheduler::new(&graph);
        let mut result = BuildResult::default();
        let mut inputs = BTreeSet::new();
        let mut outputs = BTreeSet::new();
        let mut tasks = JoinSet::new();
        let mut task_nodes = HashMap::new();

        loop {
            let free = max_concurrency.saturating_sub(scheduler.running());
            for idx in scheduler.collect_ready(free) {
                let target = Arc::clone(graph.target(idx));
                let env = Arc::clone(&env);
                let manifest = Arc::clone(&manifest);
                let handle = tasks.spawn(run_node(target, env, manifest));
                task_nodes.insert(handle.id(), idx);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            let (idx, outcome) = match joined {
                Ok((id, outcome)) => (task_nodes.remove(&id), outcome),
                Err(err) => (
                    task_nodes.remove(&err.id()),
                    Err(BuildError::Other(anyhow!("build task panicked: {err}"))),
                ),
            };
            let Some(idx) = idx else {
                return Err(BuildError::Other(anyhow!("completed task has no graph node")));
            };
            let name = graph.target(idx).name().to_string();

            match outcome {
                Ok(report) => {
                    scheduler.mark_succeeded(idx);
                    inputs.extend(report.node.inputs);
                    outputs.extend(report.node.outputs);
                    let status = if report.skipped {
                        TargetStatus::UpToDate
                    } else {
                        TargetStatus::Built
                    };
                    result.statuses.insert(name.clone(), status);
                    result.performance.insert(
                        name.clone(),
                        PerformanceMeasurement {
                            target: name,
                            skipped: report.skipped,
                            succeeded: true,
                            elapsed: report.elapsed,
                        },
                    );
                }
                Err(err) => {
                    error!(name = %name, error = %err, "target failed");
                    for blocked in scheduler.mark_failed(idx) {
                        let blocked_name = graph.target(blocked).name().to_string();
                        result.statuses.insert(blocked_name, TargetStatus::Blocked);
                    }
                    result.statuses.insert(name.clone(), TargetStatus::Failed);
                    result.performance.insert(
                        name.clone(),
                        PerformanceMeasurement {
                            target: name.clone(),
                            skipped: false,
                            succeeded: false,
                            elapsed: Duration::ZERO,
                        },
                    );
                    result.failures.push(TargetFailure {
                        target: name,
                        error: err,
                    });
                }
            }

            if scheduler.is_finished() && tasks.is_empty() {
                break;
            }
        }

        result.success = result.failures.is_empty();
        result.input_files = inputs.difference(&outputs).cloned().collect();
        result.output_files = outputs.into_iter().collect();

        if result.success {
            manifest.persist(fs.as_ref())?;
            info!(
                built = result.built_targets().len(),
                total = graph.len(),
                "build succeeded"
            );
        } else {
            error!(
                failed = ?result.failed_targets(),
                "build failed; hash manifest left unchanged"
            );
        }

        Ok(result)
    }
}

/// Check one target and, if stale, run its action and record the result.
async fn run_node(
    target: Arc<dyn Target>,
    env: Arc<Environment>,
    manifest: Arc<HashManifest>,
) -> Result<NodeReport> {
    let start = Instant::now();
    let name = target.name().to_string();

    let (node, freshness) = {
        let target = Arc::clone(&target);
        let env = Arc::clone(&env);
        let manifest = Arc::clone(&manifest);
        tokio::task::spawn_blocking(move || -> Result<_> {
            let node = node::resolve_node(target.as_ref(), &env)?;
            let freshness = node::check_node(target.as_ref(), &node, &env, &manifest)?;
            Ok((node, freshness))
        })
        .await
        .map_err(|e| BuildError::Other(anyhow!("staleness check panicked: {e}")))??
    };

    let reasons = match freshness {
        Freshness::Fresh => {
            debug!(name = %name, "up to date; skipping");
            return Ok(NodeReport {
                skipped: true,
                node,
                elapsed: start.elapsed(),
            });
        }
        Freshness::Stale(reasons) => reasons,
    };

    for reason in &reasons {
        debug!(name = %name, %reason, "stale");
    }
    info!(name = %name, reasons = reasons.len(), "running target");

    target
        .build(&env)
        .await
        .map_err(|err| BuildError::from_action(&name, err))?;

    let node = tokio::task::spawn_blocking(move || {
        node::record_build(target.as_ref(), &env, &manifest)
    })
    .await
    .map_err(|e| BuildError::Other(anyhow!("recording build panicked: {e}")))??;

    let elapsed = start.elapsed();
    info!(name = %name, elapsed_ms = elapsed.as_millis() as u64, "target finished");

    Ok(NodeReport {
        skipped: false,
        node,
        elapsed,
    })
}
