// tests/depfile.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use flutter_assemble::build::{BuildOptions, BuildSystem, TargetStatus};
use flutter_assemble::depfile::{Depfile, DepfileError, DepfileService};
use flutter_assemble::fs::mock::MockFileSystem;
use flutter_assemble_test_utils::builders::TargetBuilder;
use flutter_assemble_test_utils::fixtures::{build_path, project_path, test_environment};
use flutter_assemble_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

#[test]
fn parses_outputs_and_inputs() -> TestResult {
    let depfile: Depfile = "out/a.o out/b.o: src/a.c src/b.c\n".parse()?;
    assert_eq!(depfile.outputs(), paths(&["out/a.o", "out/b.o"]).as_slice());
    assert_eq!(depfile.inputs(), paths(&["src/a.c", "src/b.c"]).as_slice());
    Ok(())
}

#[test]
fn unescapes_spaces_and_backslashes() -> TestResult {
    let depfile: Depfile = r"/out/my\ app.dill: /src/my\ file.dart /src/back\\slash.dart".parse()?;
    assert_eq!(depfile.outputs(), paths(&["/out/my app.dill"]).as_slice());
    assert_eq!(
        depfile.inputs(),
        paths(&["/src/my file.dart", r"/src/back\slash.dart"]).as_slice()
    );
    Ok(())
}

#[test]
fn joins_continuation_lines() -> TestResult {
    let depfile: Depfile = "app.dill: \\\n  lib/main.dart \\\n  lib/src/util.dart\n".parse()?;
    assert_eq!(depfile.outputs(), paths(&["app.dill"]).as_slice());
    assert_eq!(
        depfile.inputs(),
        paths(&["lib/main.dart", "lib/src/util.dart"]).as_slice()
    );
    Ok(())
}

#[test]
fn drive_letter_colon_is_not_a_separator() -> TestResult {
    let depfile: Depfile = r"C:\build\app.dill: C:\src\main.dart".parse()?;
    assert_eq!(depfile.outputs(), paths(&[r"C:\build\app.dill"]).as_slice());
    assert_eq!(depfile.inputs(), paths(&[r"C:\src\main.dart"]).as_slice());
    Ok(())
}

#[test]
fn dollar_escape_is_undone() -> TestResult {
    let depfile: Depfile = "out: price$$list.txt".parse()?;
    assert_eq!(depfile.inputs(), paths(&["price$list.txt"]).as_slice());
    Ok(())
}

#[test]
fn malformed_contents_are_rejected() {
    for contents in ["", "   \n", "no separator here"] {
        let err = contents.parse::<Depfile>().unwrap_err();
        assert!(
            matches!(err, DepfileError::Malformed(_)),
            "expected Malformed for {contents:?}"
        );
    }
}

#[test]
fn display_escapes_paths_with_spaces() -> TestResult {
    let depfile = Depfile::new(paths(&["/src/a b.dart"]), paths(&["/out/x.dill"]));
    assert_eq!(depfile.to_string(), r"/out/x.dill: /src/a\ b.dart");

    let reparsed: Depfile = depfile.to_string().parse()?;
    assert_eq!(reparsed, depfile);
    Ok(())
}

#[test]
fn dollar_and_hash_survive_a_rewrite() -> TestResult {
    let depfile = Depfile::new(
        paths(&["/src/price$$list.txt", "/src/$HOME/a.dart", "/src/#1.dart"]),
        paths(&["/out/x$.dill"]),
    );
    let written = depfile.to_string();
    assert_eq!(
        written,
        r"/out/x$$.dill: /src/price$$$$list.txt /src/$$HOME/a.dart /src/\#1.dart"
    );

    let reparsed: Depfile = written.parse()?;
    assert_eq!(reparsed, depfile);
    Ok(())
}

#[test]
fn service_resolves_relative_entries_against_depfile_dir() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/build/kernel.d", "app.dill: ../lib/main.dart /abs/dep.dart\n");
    let service = DepfileService::new(Arc::new(fs.clone()));

    let depfile = service.parse(std::path::Path::new("/build/kernel.d"))?;
    assert_eq!(depfile.outputs(), paths(&["/build/app.dill"]).as_slice());
    assert_eq!(
        depfile.inputs(),
        paths(&["/build/../lib/main.dart", "/abs/dep.dart"]).as_slice()
    );
    Ok(())
}

#[test]
fn service_write_then_parse() -> TestResult {
    let fs = MockFileSystem::new();
    let service = DepfileService::new(Arc::new(fs.clone()));
    let depfile = Depfile::new(paths(&["/src/in put.txt"]), paths(&["/out/result.txt"]));

    service.write(&depfile, std::path::Path::new("/build/gen.d"))?;
    assert_eq!(
        fs.contents("/build/gen.d").unwrap(),
        b"/out/result.txt: /src/in\\ put.txt\n"
    );
    assert_eq!(service.parse(std::path::Path::new("/build/gen.d"))?, depfile);
    Ok(())
}

#[test]
fn service_reports_missing_file_as_io_error() {
    let fs = MockFileSystem::new();
    let service = DepfileService::new(Arc::new(fs));
    let err = service
        .parse(std::path::Path::new("/build/missing.d"))
        .unwrap_err();
    assert!(matches!(err, DepfileError::Io(_)));
}

fn tracking_target() -> Arc<flutter_assemble_test_utils::builders::TestTarget> {
    TargetBuilder::new("codegen")
        .output("{BUILD_DIR}/gen.out")
        .depfile(
            "codegen.d",
            Depfile::new(vec![project_path("hidden.txt")], vec![build_path("gen.out")]),
        )
        .build()
}

#[tokio::test]
async fn depfile_input_change_makes_target_stale() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(project_path("hidden.txt"), "v1");
    let env = test_environment(&fs).build();
    let target = tracking_target();
    let system = BuildSystem::new(BuildOptions { max_concurrency: 1 });

    let first = system.build(target.clone(), &env).await?;
    assert_eq!(first.status("codegen"), Some(TargetStatus::Built));
    assert!(fs.contents(build_path("codegen.d")).is_some());

    let second = system.build(target.clone(), &env).await?;
    assert_eq!(second.status("codegen"), Some(TargetStatus::UpToDate));
    assert!(second.input_files.contains(&project_path("hidden.txt")));

    fs.add_file(project_path("hidden.txt"), "v2");
    let third = system.build(target.clone(), &env).await?;
    assert_eq!(third.status("codegen"), Some(TargetStatus::Built));
    assert_eq!(target.runs(), 2);
    Ok(())
}

#[tokio::test]
async fn malformed_depfile_forces_rerun_without_failing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(project_path("hidden.txt"), "v1");
    let env = test_environment(&fs).build();
    let target = tracking_target();
    let system = BuildSystem::new(BuildOptions { max_concurrency: 1 });

    system.build(target.clone(), &env).await?;
    fs.add_file(build_path("codegen.d"), "this is not a depfile");

    let result = system.build(target.clone(), &env).await?;
    assert!(result.success);
    assert_eq!(result.status("codegen"), Some(TargetStatus::Built));

    // The action rewrote a valid depfile.
    let result = system.build(target.clone(), &env).await?;
    assert_eq!(result.status("codegen"), Some(TargetStatus::UpToDate));
    assert_eq!(target.runs(), 2);
    Ok(())
}

#[tokio::test]
async fn deleted_depfile_forces_rerun() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(project_path("hidden.txt"), "v1");
    let env = test_environment(&fs).build();
    let target = tracking_target();
    let system = BuildSystem::new(BuildOptions { max_concurrency: 1 });

    system.build(target.clone(), &env).await?;
    fs.remove(build_path("codegen.d"));

    let result = system.build(target.clone(), &env).await?;
    assert_eq!(result.status("codegen"), Some(TargetStatus::Built));
    Ok(())
}
