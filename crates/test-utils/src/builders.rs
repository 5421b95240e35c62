#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use flutter_assemble::config::{ConfigFile, RawConfigFile, TargetConfig};
use flutter_assemble::depfile::Depfile;
use flutter_assemble::environment::Environment;
use flutter_assemble::source::visitor::resolve_pattern;
use flutter_assemble::source::{Source, SourceKind, SourceVisitor};
use flutter_assemble::target::{BoxFuture, Target};

/// Shared, ordered record of which targets ran.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, name: &str) {
        self.entries.lock().unwrap().push(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// A target that behaves like a tiny compiler: every declared output pattern
/// is written with the target name followed by the contents of its inputs.
#[derive(Debug)]
pub struct TestTarget {
    name: String,
    inputs: Vec<Source>,
    outputs: Vec<Source>,
    depfiles: Vec<(String, Depfile)>,
    dependencies: Mutex<Vec<Arc<dyn Target>>>,
    failing: AtomicBool,
    runs: AtomicUsize,
    log: ExecutionLog,
}

impl TestTarget {
    /// Number of times the action ran.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Add a dependency after construction; used to build cycles.
    pub fn add_dependency(&self, target: Arc<dyn Target>) {
        self.dependencies.lock().unwrap().push(target);
    }
}

impl Target for TestTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<Source> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<Source> {
        self.outputs.clone()
    }

    fn dependencies(&self) -> Vec<Arc<dyn Target>> {
        self.dependencies.lock().unwrap().clone()
    }

    fn depfiles(&self) -> Vec<String> {
        self.depfiles.iter().map(|(name, _)| name.clone()).collect()
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.log.push(&self.name);
            let fs = env.file_system();

            let mut visitor = SourceVisitor::new(env, SourceKind::Inputs);
            visitor.visit_all(&self.inputs)?;
            let mut contents = format!("{}:", self.name).into_bytes();
            for input in visitor.sources() {
                if fs.is_file(input) {
                    contents.extend(fs.read(input)?);
                }
            }

            for output in &self.outputs {
                if let Source::Pattern { pattern, .. } = output {
                    if pattern.contains('*') {
                        continue;
                    }
                    let path = resolve_pattern(env, pattern)?;
                    fs.write(&path, &contents)?;
                }
            }

            for (name, depfile) in &self.depfiles {
                env.depfile_service()
                    .write(depfile, &env.build_dir().join(name))?;
            }

            if self.failing.load(Ordering::SeqCst) {
                bail!("{} failed on purpose", self.name);
            }
            Ok(())
        })
    }
}

/// Builder for [`TestTarget`].
pub struct TargetBuilder {
    name: String,
    inputs: Vec<Source>,
    outputs: Vec<Source>,
    depfiles: Vec<(String, Depfile)>,
    dependencies: Vec<Arc<dyn Target>>,
    failing: bool,
    log: ExecutionLog,
}

impl TargetBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            depfiles: Vec::new(),
            dependencies: Vec::new(),
            failing: false,
            log: ExecutionLog::new(),
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.inputs.push(Source::pattern(pattern));
        self
    }

    pub fn input_source(mut self, source: Source) -> Self {
        self.inputs.push(source);
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.outputs.push(Source::pattern(pattern));
        self
    }

    /// Declare a depfile that the action writes with the given contents.
    pub fn depfile(mut self, name: &str, depfile: Depfile) -> Self {
        self.depfiles.push((name.to_string(), depfile));
        self
    }

    pub fn depends_on(mut self, target: Arc<dyn Target>) -> Self {
        self.dependencies.push(target);
        self
    }

    pub fn fails(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn log(mut self, log: &ExecutionLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn build(self) -> Arc<TestTarget> {
        Arc::new(TestTarget {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            depfiles: self.depfiles,
            dependencies: Mutex::new(self.dependencies),
            failing: AtomicBool::new(self.failing),
            runs: AtomicUsize::new(0),
            log: self.log,
        })
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                target: BTreeMap::new(),
                ..RawConfigFile::default()
            },
        }
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.config.target.insert(name.to_string(), target);
        self
    }

    pub fn with_define(mut self, key: &str, value: &str) -> Self {
        self.config
            .defines
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.config.build.max_concurrency = Some(n);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            target: TargetConfig {
                cmd: cmd.to_string(),
                inputs: vec![],
                outputs: vec![],
                depends: vec![],
                depfiles: vec![],
            },
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.target.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.target.outputs.push(pattern.to_string());
        self
    }

    pub fn depends(mut self, dep: &str) -> Self {
        self.target.depends.push(dep.to_string());
        self
    }

    pub fn depfile(mut self, name: &str) -> Self {
        self.target.depfiles.push(name.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}
