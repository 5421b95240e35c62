// src/targets/command.rs

//! Targets declared in the project config as `[target.<name>]` sections.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::{ConfigFile, TargetConfig};
use crate::environment::Environment;
use crate::errors;
use crate::exec::ProcessCommand;
use crate::source::Source;
use crate::target::{BoxFuture, Target};
use crate::targets::common::check_exit;
use crate::targets::TargetRegistry;

/// Runs a shell command in the project directory.
#[derive(Debug, Clone)]
pub struct CommandTarget {
    name: String,
    cmd: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    depfiles: Vec<String>,
    dependencies: Vec<Arc<dyn Target>>,
}

impl CommandTarget {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            depfiles: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Build from a config section, looking dependencies up in `registry`.
    pub fn from_config(
        name: &str,
        config: &TargetConfig,
        registry: &TargetRegistry,
    ) -> errors::Result<Self> {
        let dependencies = config
            .depends
            .iter()
            .map(|dep| registry.get(dep))
            .collect::<errors::Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            cmd: config.cmd.clone(),
            inputs: config.inputs.clone(),
            outputs: config.outputs.clone(),
            depfiles: config.depfiles.clone(),
            dependencies,
        })
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn with_inputs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, inputs: I) -> Self {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I: IntoIterator<Item = S>, S: Into<String>>(mut self, outputs: I) -> Self {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }

    pub fn with_depfile(mut self, depfile: impl Into<String>) -> Self {
        self.depfiles.push(depfile.into());
        self
    }

    pub fn with_dependency(mut self, target: Arc<dyn Target>) -> Self {
        self.dependencies.push(target);
        self
    }
}

impl Target for CommandTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<Source> {
        self.inputs.iter().map(Source::pattern).collect()
    }

    fn outputs(&self) -> Vec<Source> {
        self.outputs.iter().map(Source::pattern).collect()
    }

    fn dependencies(&self) -> Vec<Arc<dyn Target>> {
        self.dependencies.clone()
    }

    fn depfiles(&self) -> Vec<String> {
        self.depfiles.clone()
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let command = ProcessCommand::shell(&self.cmd).current_dir(env.project_dir());
            let output = env.process_manager().run(&command).await?;
            for line in output.stdout.lines() {
                debug!(name = %self.name, "stdout: {}", line);
            }
            check_exit(&self.name, &output)
        })
    }
}

/// Register every config-declared target, dependencies first.
pub fn register_command_targets(
    registry: &mut TargetRegistry,
    config: &ConfigFile,
) -> errors::Result<()> {
    for name in config.target_order() {
        let Some(section) = config.target.get(name) else {
            continue;
        };
        let target = CommandTarget::from_config(name, section, registry)?;
        registry.register(Arc::new(target))?;
    }
    Ok(())
}
