// tests/real_fs.rs

use std::error::Error;
use std::fs;
use std::sync::Arc;

use clap::Parser;
use flutter_assemble::build::{BuildOptions, BuildSystem, TargetStatus};
use flutter_assemble::cli::CliArgs;
use flutter_assemble::environment::Environment;
use flutter_assemble::targets::CommandTarget;
use flutter_assemble::run;
use flutter_assemble_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn shell_command_target_rebuilds_only_on_content_change() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let project = dir.path();
    fs::write(project.join("input.txt"), "first")?;

    let target = Arc::new(
        CommandTarget::new("concat", "mkdir -p out && cat input.txt > out/result.txt")
            .with_inputs(["{PROJECT_DIR}/input.txt"])
            .with_outputs(["{PROJECT_DIR}/out/result.txt"]),
    );
    let env = Environment::builder(project)
        .build_dir(project.join(".build"))
        .build();
    let system = BuildSystem::new(BuildOptions { max_concurrency: 1 });

    let first = with_timeout(system.build(target.clone(), &env)).await?;
    assert_eq!(first.status("concat"), Some(TargetStatus::Built));
    assert_eq!(fs::read_to_string(project.join("out/result.txt"))?, "first");
    assert!(project.join(".build/.assemble_manifest.json").is_file());

    let second = with_timeout(system.build(target.clone(), &env)).await?;
    assert_eq!(second.status("concat"), Some(TargetStatus::UpToDate));

    fs::write(project.join("input.txt"), "second")?;
    let third = with_timeout(system.build(target.clone(), &env)).await?;
    assert_eq!(third.status("concat"), Some(TargetStatus::Built));
    assert_eq!(fs::read_to_string(project.join("out/result.txt"))?, "second");
    Ok(())
}

const GREET_CONFIG: &str = r#"
[environment]
project_dir = "."

[target.greet]
cmd = "cat input.txt > greeting.txt"
inputs = ["{PROJECT_DIR}/input.txt"]
outputs = ["{PROJECT_DIR}/greeting.txt"]
"#;

#[tokio::test]
async fn run_builds_config_targets_and_writes_build_files() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let project = dir.path();
    fs::write(project.join("input.txt"), "hello")?;
    let config = project.join("assemble.toml");
    fs::write(&config, GREET_CONFIG)?;
    let depfile = project.join("out.d");
    let inputs_list = project.join("inputs.txt");
    let outputs_list = project.join("outputs.txt");

    let config = config.display().to_string();
    let depfile_arg = depfile.display().to_string();
    let inputs_arg = inputs_list.display().to_string();
    let outputs_arg = outputs_list.display().to_string();
    let args = CliArgs::try_parse_from([
        "flutter-assemble",
        "greet",
        "--config",
        config.as_str(),
        "--depfile",
        depfile_arg.as_str(),
        "--build-inputs",
        inputs_arg.as_str(),
        "--build-outputs",
        outputs_arg.as_str(),
    ])?;
    with_timeout(run(args)).await?;

    assert_eq!(fs::read_to_string(project.join("greeting.txt"))?, "hello");

    let depfile = fs::read_to_string(&depfile)?;
    let (outputs, inputs) = depfile.split_once(": ").expect("depfile has a separator");
    assert!(outputs.contains("greeting.txt"), "{depfile}");
    assert!(inputs.contains("input.txt"), "{depfile}");

    let inputs = fs::read_to_string(&inputs_list)?;
    assert_eq!(inputs.lines().count(), 1);
    assert!(inputs.trim_end().ends_with("input.txt"));
    let outputs = fs::read_to_string(&outputs_list)?;
    assert!(outputs.trim_end().ends_with("greeting.txt"));
    Ok(())
}

#[tokio::test]
async fn run_reports_failed_targets() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = dir.path().join("assemble.toml");
    fs::write(
        &config,
        "[environment]\nproject_dir = \".\"\n\n[target.broken]\ncmd = \"echo nope >&2; exit 3\"\n",
    )?;

    let config = config.display().to_string();
    let args = CliArgs::try_parse_from([
        "flutter-assemble",
        "broken",
        "--config",
        config.as_str(),
    ])?;
    let err = with_timeout(run(args)).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("build failed"), "{message}");
    assert!(message.contains("broken exited with code 3: nope"), "{message}");
    Ok(())
}

#[tokio::test]
async fn dry_run_does_not_touch_the_project() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = dir.path().join("assemble.toml");
    fs::write(&config, GREET_CONFIG)?;

    let config = config.display().to_string();
    let args = CliArgs::try_parse_from([
        "flutter-assemble",
        "greet",
        "--dry-run",
        "--config",
        config.as_str(),
    ])?;
    with_timeout(run(args)).await?;

    assert!(!dir.path().join(".dart_tool").exists());
    assert!(!dir.path().join("greeting.txt").exists());
    Ok(())
}

#[tokio::test]
async fn run_rejects_unknown_targets() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config = dir.path().join("assemble.toml").display().to_string();

    let args = CliArgs::try_parse_from([
        "flutter-assemble",
        "no_such_target",
        "--config",
        config.as_str(),
    ])?;
    let err = run(args).await.unwrap_err();
    assert!(err.to_string().contains("no_such_target"));
    Ok(())
}
