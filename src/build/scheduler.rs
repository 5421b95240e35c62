// src/build/scheduler.rs

//! Ready-queue state machine for one build invocation.

use tracing::debug;

use crate::build::graph::TargetGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// A transitive dependency failed; never executed.
    Blocked,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Pending | NodeState::Running)
    }
}

/// Decides which targets may start.
///
/// A node is ready when it is pending and all of its dependencies succeeded.
/// Ready nodes are handed out lowest index first, so with one worker the
/// execution order is exactly the graph's post-order.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g TargetGraph,
    states: Vec<NodeState>,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g TargetGraph) -> Self {
        Self {
            graph,
            states: vec![NodeState::Pending; graph.len()],
        }
    }

    pub fn state_of(&self, idx: usize) -> NodeState {
        self.states[idx]
    }

    fn deps_satisfied(&self, idx: usize) -> bool {
        self.graph
            .dependencies_of(idx)
            .iter()
            .all(|&dep| self.states[dep] == NodeState::Succeeded)
    }

    /// Mark up to `limit` ready nodes as running and return them.
    pub fn collect_ready(&mut self, limit: usize) -> Vec<usize> {
        let ready: Vec<usize> = (0..self.states.len())
            .filter(|&idx| self.states[idx] == NodeState::Pending && self.deps_satisfied(idx))
            .take(limit)
            .collect();

        for &idx in &ready {
            debug!(name = %self.graph.target(idx).name(), "dependencies satisfied; scheduling");
            self.states[idx] = NodeState::Running;
        }
        ready
    }

    pub fn mark_succeeded(&mut self, idx: usize) {
        self.states[idx] = NodeState::Succeeded;
    }

    /// Mark `idx` failed and block every pending transitive dependent.
    ///
    /// Returns the newly blocked nodes.
    pub fn mark_failed(&mut self, idx: usize) -> Vec<usize> {
        self.states[idx] = NodeState::Failed;

        let mut stack: Vec<usize> = self.graph.dependents_of(idx).to_vec();
        let mut blocked = Vec::new();
        while let Some(next) = stack.pop() {
            if self.states[next] == NodeState::Pending {
                self.states[next] = NodeState::Blocked;
                debug!(
                    name = %self.graph.target(next).name(),
                    "blocked by failed dependency"
                );
                blocked.push(next);
                stack.extend_from_slice(self.graph.dependents_of(next));
            }
        }
        blocked
    }

    /// No node is pending or running.
    pub fn is_finished(&self) -> bool {
        self.states.iter().all(|s| s.is_terminal())
    }

    pub fn running(&self) -> usize {
        self.states.iter().filter(|s| **s == NodeState::Running).count()
    }
}
