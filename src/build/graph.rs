// src/build/graph.rs

//! Dependency closure of the requested targets, in post-order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{BuildError, Result};
use crate::target::Target;

/// The transitive dependency closure of one or more root targets.
///
/// Nodes are stored in depth-first post-order, so every target's index is
/// greater than the indices of all of its dependencies. Targets reachable
/// through several paths appear once; identity is the target name.
#[derive(Debug, Default)]
pub struct TargetGraph {
    nodes: Vec<Arc<dyn Target>>,
    index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl TargetGraph {
    pub fn resolve(root: Arc<dyn Target>) -> Result<Self> {
        Self::resolve_all(&[root])
    }

    /// Resolve the closure of every root, failing with
    /// [`BuildError::CyclicDependency`] before anything runs.
    pub fn resolve_all(roots: &[Arc<dyn Target>]) -> Result<Self> {
        let mut graph = TargetGraph::default();
        let mut visiting = Vec::new();
        for root in roots {
            graph.visit(Arc::clone(root), &mut visiting)?;
        }

        graph.dependents = vec![Vec::new(); graph.nodes.len()];
        for (idx, deps) in graph.dependencies.iter().enumerate() {
            for &dep in deps {
                graph.dependents[dep].push(idx);
            }
        }

        debug!(order = ?graph.names(), "resolved build graph");
        Ok(graph)
    }

    fn visit(&mut self, target: Arc<dyn Target>, visiting: &mut Vec<String>) -> Result<usize> {
        let name = target.name().to_string();
        if let Some(&idx) = self.index.get(&name) {
            return Ok(idx);
        }
        if let Some(pos) = visiting.iter().position(|n| *n == name) {
            let mut cycle = visiting[pos..].to_vec();
            cycle.push(name);
            return Err(BuildError::CyclicDependency { cycle });
        }

        visiting.push(name.clone());
        let mut deps = Vec::new();
        for dep in target.dependencies() {
            let dep_idx = self.visit(dep, visiting)?;
            if !deps.contains(&dep_idx) {
                deps.push(dep_idx);
            }
        }
        visiting.pop();

        let idx = self.nodes.len();
        self.nodes.push(target);
        self.index.insert(name, idx);
        self.dependencies.push(deps);
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn target(&self, idx: usize) -> &Arc<dyn Target> {
        &self.nodes[idx]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Targets in execution order (dependencies first).
    pub fn order(&self) -> impl Iterator<Item = &Arc<dyn Target>> {
        self.nodes.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|t| t.name()).collect()
    }

    /// Direct dependencies of the node at `idx`.
    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        &self.dependencies[idx]
    }

    /// Direct dependents of the node at `idx`.
    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        &self.dependents[idx]
    }
}
