// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};
use crate::targets::BUILTIN_TARGETS;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_build_section(&raw)?;
        validate_targets(&raw)?;
        let order = target_order(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.environment,
            raw.defines,
            raw.build,
            raw.target,
            order,
        ))
    }
}

fn validate_build_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.max_concurrency == Some(0) {
        return Err(BuildError::ConfigError(
            "[build].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_targets(cfg: &RawConfigFile) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        if BUILTIN_TARGETS.contains(&name.as_str()) {
            return Err(BuildError::ConfigError(format!(
                "target '{}' collides with a built-in target",
                name
            )));
        }
        if target.cmd.trim().is_empty() {
            return Err(BuildError::ConfigError(format!(
                "target '{}' has an empty `cmd`",
                name
            )));
        }
        for pattern in target.inputs.iter().chain(target.outputs.iter()) {
            if !pattern.starts_with('{') {
                return Err(BuildError::ConfigError(format!(
                    "target '{}' has pattern '{}' that does not start with a {{VARIABLE}} root",
                    name, pattern
                )));
            }
        }
        for dep in target.depends.iter() {
            if dep == name {
                return Err(BuildError::CyclicDependency {
                    cycle: vec![name.clone(), name.clone()],
                });
            }
            if !cfg.target.contains_key(dep) && !BUILTIN_TARGETS.contains(&dep.as_str()) {
                return Err(BuildError::ConfigError(format!(
                    "target '{}' has unknown dependency '{}' in `depends`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Topological order of config targets; edges run dependency -> dependent.
fn target_order(cfg: &RawConfigFile) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.target.keys() {
        graph.add_node(name.as_str());
    }
    for (name, target) in cfg.target.iter() {
        for dep in target.depends.iter() {
            if cfg.target.contains_key(dep) {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(BuildError::CyclicDependency {
            cycle: cycle_path(cfg, &graph, cycle.node_id()),
        }),
    }
}

/// Follow `depends` from the smallest name in `node`'s strongly connected
/// component back to itself, e.g. `["a", "b", "a"]`.
fn cycle_path<'a>(
    cfg: &'a RawConfigFile,
    graph: &DiGraphMap<&'a str, ()>,
    node: &'a str,
) -> Vec<String> {
    let component: BTreeSet<&'a str> = kosaraju_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&node))
        .map(|scc| scc.into_iter().collect())
        .unwrap_or_default();
    let Some(&start) = component.iter().next() else {
        return vec![node.to_string(), node.to_string()];
    };

    let mut path = vec![start];
    let mut visited = BTreeSet::new();
    if walk_back_to(cfg, &component, start, &mut path, &mut visited) {
        path.into_iter().map(str::to_string).collect()
    } else {
        vec![start.to_string(), start.to_string()]
    }
}

fn walk_back_to<'a>(
    cfg: &'a RawConfigFile,
    component: &BTreeSet<&'a str>,
    start: &'a str,
    path: &mut Vec<&'a str>,
    visited: &mut BTreeSet<&'a str>,
) -> bool {
    let Some(current) = path.last().copied() else {
        return false;
    };
    let Some(target) = cfg.target.get(current) else {
        return false;
    };
    for dep in target.depends.iter().map(String::as_str) {
        if !component.contains(dep) {
            continue;
        }
        if dep == start {
            path.push(dep);
            return true;
        }
        if visited.insert(dep) {
            path.push(dep);
            if walk_back_to(cfg, component, start, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}
