// tests/config_validation.rs

use std::error::Error;
use std::sync::Arc;

use flutter_assemble::build::{BuildOptions, BuildSystem, TargetStatus};
use flutter_assemble::config::{load_and_validate, load_optional, parse_str, ConfigFile};
use flutter_assemble::errors::BuildError;
use flutter_assemble::fs::mock::MockFileSystem;
use flutter_assemble::target::Target;
use flutter_assemble::targets::{
    register_command_targets, CommandTarget, PubspecAssetBundle, TargetRegistry,
};
use flutter_assemble_test_utils::builders::{ConfigFileBuilder, TargetConfigBuilder};
use flutter_assemble_test_utils::fake_process::{FakeProcessManager, FakeResponse};
use flutter_assemble_test_utils::fixtures::{build_path, test_environment, PROJECT};
use flutter_assemble_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const FULL_CONFIG: &str = r#"
[environment]
project_dir = "."
output_dir = "build/linux/x64/debug/bundle"

[defines]
BuildMode = "debug"
TargetPlatform = "linux-x64"

[build]
max_concurrency = 4

[target.codegen]
cmd = "dart run build_runner build"
inputs = ["{PROJECT_DIR}/lib/*.dart"]
outputs = ["{BUILD_DIR}/codegen.stamp"]
depends = ["kernel_snapshot"]
depfiles = ["codegen.d"]

[target.package]
cmd = "tar czf bundle.tgz build"
depends = ["codegen"]
"#;

fn expect_config_error(result: Result<ConfigFile, BuildError>, needle: &str) {
    match result {
        Err(BuildError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message `{msg}` should mention `{needle}`")
        }
        Err(other) => panic!("expected ConfigError, got {other:?}"),
        Ok(_) => panic!("expected ConfigError mentioning `{needle}`"),
    }
}

#[test]
fn full_config_parses_and_orders_targets() -> TestResult {
    let config = ConfigFile::try_from(parse_str(FULL_CONFIG)?)?;

    assert_eq!(config.defines["BuildMode"], "debug");
    assert_eq!(config.build.max_concurrency, Some(4));
    assert_eq!(
        config.environment.output_dir.as_deref(),
        Some(std::path::Path::new("build/linux/x64/debug/bundle"))
    );
    assert_eq!(config.target_order(), ["codegen", "package"]);
    assert_eq!(config.target["codegen"].depfiles, vec!["codegen.d"]);
    Ok(())
}

#[test]
fn empty_config_is_valid() -> TestResult {
    let config = ConfigFile::try_from(parse_str("")?)?;
    assert!(config.target.is_empty());
    assert!(config.target_order().is_empty());
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() {
    let err = parse_str("[build]\nworkers = 3\n").unwrap_err();
    assert!(matches!(err, BuildError::TomlError(_)));
}

#[test]
fn zero_concurrency_is_rejected() {
    let raw = ConfigFileBuilder::new().with_max_concurrency(0).raw();
    expect_config_error(ConfigFile::try_from(raw), "max_concurrency");
}

#[test]
fn builtin_names_cannot_be_redefined() {
    let raw = ConfigFileBuilder::new()
        .with_target("copy_assets", TargetConfigBuilder::new("cp -r assets build").build())
        .raw();
    expect_config_error(ConfigFile::try_from(raw), "built-in");
}

#[test]
fn empty_command_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_target("noop", TargetConfigBuilder::new("   ").build())
        .raw();
    expect_config_error(ConfigFile::try_from(raw), "empty `cmd`");
}

#[test]
fn patterns_must_start_with_a_root_variable() {
    let raw = ConfigFileBuilder::new()
        .with_target(
            "gen",
            TargetConfigBuilder::new("gen")
                .output("build/out.txt")
                .build(),
        )
        .raw();
    expect_config_error(ConfigFile::try_from(raw), "build/out.txt");
}

#[test]
fn self_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_target("gen", TargetConfigBuilder::new("gen").depends("gen").build())
        .raw();
    match ConfigFile::try_from(raw) {
        Err(BuildError::CyclicDependency { cycle }) => assert_eq!(cycle, ["gen", "gen"]),
        Err(other) => panic!("expected CyclicDependency, got {other:?}"),
        Ok(_) => panic!("expected a self-dependency to be rejected"),
    }
}

#[test]
fn unknown_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_target("gen", TargetConfigBuilder::new("gen").depends("missing").build())
        .raw();
    expect_config_error(ConfigFile::try_from(raw), "missing");
}

#[test]
fn cycles_between_config_targets_are_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_target("a", TargetConfigBuilder::new("a").depends("b").build())
        .with_target("b", TargetConfigBuilder::new("b").depends("a").build())
        .raw();
    match ConfigFile::try_from(raw) {
        Err(BuildError::CyclicDependency { cycle }) => assert_eq!(cycle, ["a", "b", "a"]),
        Err(other) => panic!("expected CyclicDependency, got {other:?}"),
        Ok(_) => panic!("expected a cycle to be rejected"),
    }
}

#[test]
fn cycle_error_names_the_whole_loop() {
    let raw = ConfigFileBuilder::new()
        .with_target("gen", TargetConfigBuilder::new("gen").depends("lint").build())
        .with_target("lint", TargetConfigBuilder::new("lint").depends("pack").build())
        .with_target("pack", TargetConfigBuilder::new("pack").depends("gen").build())
        .with_target("docs", TargetConfigBuilder::new("docs").depends("gen").build())
        .raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cyclic dependency detected: gen -> lint -> pack -> gen"
    );
}

#[test]
fn load_optional_tolerates_missing_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = load_optional(dir.path().join("assemble.toml"))?;
    assert!(config.target.is_empty());
    assert!(config.defines.is_empty());
    Ok(())
}

#[test]
fn load_and_validate_reads_from_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("assemble.toml");
    std::fs::write(&path, FULL_CONFIG)?;

    let config = load_and_validate(&path)?;
    assert_eq!(config.target.len(), 2);
    Ok(())
}

#[test]
fn command_targets_register_with_builtin_dependencies() -> TestResult {
    let config = ConfigFile::try_from(parse_str(FULL_CONFIG)?)?;
    let mut registry = TargetRegistry::with_builtin(Arc::new(PubspecAssetBundle));
    register_command_targets(&mut registry, &config)?;

    let codegen = registry.get("codegen")?;
    let deps: Vec<String> = codegen
        .dependencies()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(deps, vec!["kernel_snapshot"]);

    let package = registry.get("package")?;
    assert_eq!(package.dependencies()[0].name(), "codegen");

    let err = registry
        .register(Arc::new(CommandTarget::new("codegen", "true")))
        .unwrap_err();
    assert!(matches!(err, BuildError::DuplicateTarget(name) if name == "codegen"));

    let err = registry.get("no_such_target").unwrap_err();
    assert!(matches!(err, BuildError::TargetNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn command_target_runs_through_the_shell_in_project_dir() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("sh", FakeResponse::success().writes(build_path("codegen.stamp"), "ok"));
    let env = test_environment(&fs)
        .process_manager(Arc::new(processes.clone()))
        .build();

    let target = Arc::new(
        CommandTarget::new("codegen", "dart run build_runner build")
            .with_outputs(["{BUILD_DIR}/codegen.stamp"]),
    );
    let system = BuildSystem::new(BuildOptions { max_concurrency: 1 });

    let result = system.build(target.clone(), &env).await?;
    assert_eq!(result.status("codegen"), Some(TargetStatus::Built));

    let commands = processes.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].args, vec!["-c", "dart run build_runner build"]);
    assert_eq!(commands[0].working_dir.as_deref(), Some(std::path::Path::new(PROJECT)));

    let result = system.build(target, &env).await?;
    assert_eq!(result.status("codegen"), Some(TargetStatus::UpToDate));
    assert_eq!(processes.run_count("sh"), 1);
    Ok(())
}

#[tokio::test]
async fn failing_command_reports_exit_code_and_stderr() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("sh", FakeResponse::failure(2, "boom\n"));
    let env = test_environment(&fs)
        .process_manager(Arc::new(processes.clone()))
        .build();

    let target = Arc::new(CommandTarget::new("codegen", "make").with_outputs(["{BUILD_DIR}/x"]));
    let result = BuildSystem::new(BuildOptions { max_concurrency: 1 })
        .build(target, &env)
        .await?;

    assert!(!result.success);
    let message = result.failures[0].error.to_string();
    assert!(message.contains("codegen exited with code 2: boom"), "{message}");
    Ok(())
}
