// tests/flutter_targets.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use flutter_assemble::build::{BuildOptions, BuildSystem, TargetStatus};
use flutter_assemble::depfile::DepfileService;
use flutter_assemble::fs::mock::MockFileSystem;
use flutter_assemble::fs::FileSystem;
use flutter_assemble::target::Target;
use flutter_assemble::targets::{
    PubspecAssetBundle, TargetRegistry, UnpackLinux, COPY_ASSETS, DEBUG_BUNDLE_LINUX_ASSETS,
    PROFILE_BUNDLE_LINUX_ASSETS, RELEASE_BUNDLE_LINUX_ASSETS, UNPACK_LINUX,
};
use flutter_assemble_test_utils::fake_process::{FakeProcessManager, FakeResponse};
use flutter_assemble_test_utils::fixtures::{
    build_path, gen_snapshot_response, kernel_response, output_path, project_path,
    seed_flutter_sdk, seed_project, test_environment, ENGINE_DIR,
};
use flutter_assemble_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const ASSET_KEYS: [&str; 5] = [
    "assets/data/a.json",
    "assets/data/b.json",
    "assets/logo.png",
    "fonts/Roboto-Bold.ttf",
    "fonts/Roboto-Regular.ttf",
];

fn registry() -> TargetRegistry {
    TargetRegistry::with_builtin(Arc::new(PubspecAssetBundle))
}

fn sequential() -> BuildSystem {
    BuildSystem::new(BuildOptions { max_concurrency: 1 })
}

fn flutter_assets(key: &str) -> PathBuf {
    output_path("flutter_assets").join(key)
}

#[tokio::test]
async fn copy_assets_copies_only_what_changed() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_project(&fs);
    let env = test_environment(&fs).build();
    let target = registry().get(COPY_ASSETS)?;
    let system = sequential();

    let first = with_timeout(system.build(Arc::clone(&target), &env)).await?;
    assert_eq!(first.status(COPY_ASSETS), Some(TargetStatus::Built));
    for key in ASSET_KEYS {
        assert_eq!(fs.write_count(flutter_assets(key)), 1, "{key}");
    }
    assert_eq!(fs.contents(flutter_assets("assets/logo.png")).unwrap(), b"png");
    assert!(fs.is_file(&flutter_assets("AssetManifest.json")));
    assert!(fs.is_file(&flutter_assets("FontManifest.json")));

    fs.reset_write_counts();
    let second = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(second.status(COPY_ASSETS), Some(TargetStatus::UpToDate));
    for key in ASSET_KEYS {
        assert_eq!(fs.write_count(flutter_assets(key)), 0, "{key}");
    }
    assert_eq!(fs.write_count(flutter_assets("AssetManifest.json")), 0);

    fs.reset_write_counts();
    fs.add_file(project_path("assets/logo.png"), "png, but newer");
    let third = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(third.status(COPY_ASSETS), Some(TargetStatus::Built));
    assert_eq!(fs.write_count(flutter_assets("assets/logo.png")), 1);
    for key in ASSET_KEYS.iter().filter(|k| **k != "assets/logo.png") {
        assert_eq!(fs.write_count(flutter_assets(key)), 0, "{key}");
    }
    assert_eq!(fs.write_count(flutter_assets("AssetManifest.json")), 1);
    assert_eq!(fs.write_count(flutter_assets("FontManifest.json")), 1);
    assert_eq!(
        fs.contents(flutter_assets("assets/logo.png")).unwrap(),
        b"png, but newer"
    );
    Ok(())
}

#[tokio::test]
async fn copy_assets_writes_asset_and_font_manifests() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_project(&fs);
    let env = test_environment(&fs).build();

    sequential().build(registry().get(COPY_ASSETS)?, &env).await?;

    let assets: serde_json::Value =
        serde_json::from_str(&fs.read_to_string(&flutter_assets("AssetManifest.json"))?)?;
    let keys: Vec<&str> = assets
        .as_object()
        .expect("asset manifest is an object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, ASSET_KEYS);
    assert_eq!(assets["assets/logo.png"][0], "assets/logo.png");

    let fonts: serde_json::Value =
        serde_json::from_str(&fs.read_to_string(&flutter_assets("FontManifest.json"))?)?;
    assert_eq!(fonts[0]["family"], "Roboto");
    assert_eq!(fonts[0]["fonts"][0]["asset"], "fonts/Roboto-Regular.ttf");
    assert!(fonts[0]["fonts"][0].get("weight").is_none());
    assert_eq!(fonts[0]["fonts"][1]["weight"], 700);

    let depfile = DepfileService::new(Arc::new(fs.clone())).parse(&build_path("copy_assets.d"))?;
    assert!(depfile.inputs().contains(&project_path("pubspec.yaml")));
    assert!(depfile.outputs().contains(&flutter_assets("AssetManifest.json")));
    Ok(())
}

#[tokio::test]
async fn copy_assets_and_bundle_do_not_dirty_each_other() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", kernel_response());
    let env = test_environment(&fs)
        .define("BuildMode", "debug")
        .process_manager(Arc::new(processes.clone()))
        .build();
    let registry = registry();
    let copy = registry.get(COPY_ASSETS)?;
    let bundle = registry.get(DEBUG_BUNDLE_LINUX_ASSETS)?;
    let system = sequential();

    system.build(Arc::clone(&copy), &env).await?;
    let bundled = system.build(Arc::clone(&bundle), &env).await?;
    assert!(bundled.success, "{}", flutter_assemble::failure_report(&bundled));
    assert!(fs.is_file(&flutter_assets("kernel_blob.bin")));
    assert!(fs.is_file(&build_path("copy_assets.d")));
    assert!(fs.is_file(&build_path("debug_bundle_linux_assets.d")));

    let copy_again = system.build(Arc::clone(&copy), &env).await?;
    assert_eq!(copy_again.status(COPY_ASSETS), Some(TargetStatus::UpToDate));

    let bundle_again = system.build(Arc::clone(&bundle), &env).await?;
    assert_eq!(
        bundle_again.status(DEBUG_BUNDLE_LINUX_ASSETS),
        Some(TargetStatus::UpToDate)
    );
    assert_eq!(processes.run_count("dart"), 1);
    Ok(())
}

#[tokio::test]
async fn copy_assets_fails_on_missing_asset() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_project(&fs);
    fs.add_file(
        project_path("pubspec.yaml"),
        "name: demo\nflutter:\n  assets:\n    - assets/missing.png\n",
    );
    let env = test_environment(&fs).build();

    let result = sequential().build(registry().get(COPY_ASSETS)?, &env).await?;

    assert!(!result.success);
    assert_eq!(result.failed_targets(), vec![COPY_ASSETS]);
    let message = result.failures[0].error.to_string();
    assert!(message.contains("assets/missing.png"), "{message}");
    Ok(())
}

#[tokio::test]
async fn pubspec_without_flutter_section_bundles_nothing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(project_path("pubspec.yaml"), "name: plain_dart\n");
    let env = test_environment(&fs).build();

    let result = sequential().build(registry().get(COPY_ASSETS)?, &env).await?;

    assert!(result.success);
    let manifest = fs.read_to_string(&flutter_assets("AssetManifest.json"))?;
    assert_eq!(manifest.trim(), "{}");
    Ok(())
}

#[tokio::test]
async fn unpack_linux_tracks_undeclared_headers_through_its_depfile() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    let env = test_environment(&fs).define("BuildMode", "debug").build();
    let target: Arc<dyn Target> = Arc::new(UnpackLinux);
    let system = sequential();

    assert_eq!(target.outputs().len(), 6);

    let first = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(first.status(UNPACK_LINUX), Some(TargetStatus::Built));

    let ephemeral = project_path("linux/flutter/ephemeral");
    assert_eq!(
        fs.contents(ephemeral.join("libflutter_linux_gtk.so")).unwrap(),
        b"engine linux-x64"
    );
    assert_eq!(fs.contents(ephemeral.join("icudtl.dat")).unwrap(), b"icu");
    let extra_header = ephemeral.join("flutter_linux/fl_method_channel.h");
    assert!(fs.is_file(&extra_header));

    let depfile = DepfileService::new(Arc::new(fs.clone()))
        .parse(&build_path("linux_engine_sources.d"))?;
    assert_eq!(depfile.outputs().len(), 7);
    assert!(depfile.outputs().contains(&extra_header));

    let second = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(second.status(UNPACK_LINUX), Some(TargetStatus::UpToDate));

    fs.remove(&extra_header);
    let third = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(third.status(UNPACK_LINUX), Some(TargetStatus::Built));
    assert!(fs.is_file(&extra_header));
    Ok(())
}

#[tokio::test]
async fn unpack_linux_rejects_non_linux_platform() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    let env = test_environment(&fs)
        .define("BuildMode", "debug")
        .define("TargetPlatform", "darwin")
        .build();

    let result = sequential().build(Arc::new(UnpackLinux), &env).await?;
    assert!(!result.success);
    assert!(result.failures[0].error.to_string().contains("darwin"));
    Ok(())
}

#[tokio::test]
async fn debug_bundle_failure_in_kernel_snapshot_blocks_the_bundle() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", FakeResponse::failure(254, "lib/main.dart:1: Error: oops"));
    let env = test_environment(&fs)
        .define("BuildMode", "debug")
        .process_manager(Arc::new(processes.clone()))
        .build();

    let system = BuildSystem::new(BuildOptions { max_concurrency: 2 });
    let result = with_timeout(system.build(registry().get(DEBUG_BUNDLE_LINUX_ASSETS)?, &env)).await?;

    assert!(!result.success);
    assert_eq!(result.failed_targets(), vec!["kernel_snapshot"]);
    assert_eq!(result.status("kernel_snapshot"), Some(TargetStatus::Failed));
    assert_eq!(result.status(UNPACK_LINUX), Some(TargetStatus::Built));
    assert_eq!(result.status(DEBUG_BUNDLE_LINUX_ASSETS), Some(TargetStatus::Blocked));

    let message = result.failures[0].error.to_string();
    assert!(message.contains("frontend_server exited with code 254"), "{message}");
    assert!(!fs.exists(&flutter_assets("kernel_blob.bin")));
    assert!(!fs.exists(&build_path(".assemble_manifest.json")));
    Ok(())
}

#[tokio::test]
async fn debug_bundle_builds_once_then_is_up_to_date() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", kernel_response());
    let env = test_environment(&fs)
        .define("BuildMode", "debug")
        .define("TargetPlatform", "linux-x64")
        .process_manager(Arc::new(processes.clone()))
        .build();
    let target = registry().get(DEBUG_BUNDLE_LINUX_ASSETS)?;
    let system = BuildSystem::new(BuildOptions { max_concurrency: 4 });

    let first = with_timeout(system.build(Arc::clone(&target), &env)).await?;
    assert!(first.success, "{}", flutter_assemble::failure_report(&first));
    assert_eq!(
        first.built_targets(),
        vec!["debug_bundle_linux_assets", "kernel_snapshot", "unpack_linux"]
    );
    assert_eq!(fs.contents(flutter_assets("kernel_blob.bin")).unwrap(), b"kernel");
    assert!(fs.is_file(&flutter_assets("assets/logo.png")));

    let commands = processes.commands();
    assert_eq!(commands.len(), 1);
    let dart = &commands[0];
    assert_eq!(
        dart.program,
        PathBuf::from("/flutter/bin/cache/dart-sdk/bin/dart")
    );
    assert!(dart.args.contains(&"--output-dill".to_string()));
    assert!(dart.args.contains(&build_path("app.dill").display().to_string()));
    assert!(dart.args.contains(&"-Ddart.vm.product=false".to_string()));
    assert!(!dart.args.contains(&"--aot".to_string()));
    assert_eq!(
        dart.args.last().map(String::as_str),
        Some("/project/lib/main.dart")
    );

    let second = system.build(Arc::clone(&target), &env).await?;
    assert!(second.success);
    assert!(second.built_targets().is_empty());
    assert_eq!(processes.run_count("dart"), 1);

    // An edit to a Dart source listed only in the compiler's depfile.
    fs.add_file(project_path("lib/main.dart"), "void main() { print('hi'); }");
    let third = system.build(Arc::clone(&target), &env).await?;
    assert_eq!(third.status("kernel_snapshot"), Some(TargetStatus::Built));
    assert_eq!(third.status(UNPACK_LINUX), Some(TargetStatus::UpToDate));
    assert_eq!(processes.run_count("dart"), 2);
    Ok(())
}

#[tokio::test]
async fn profile_bundle_compiles_aot_and_copies_libapp() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", kernel_response());
    processes.on("gen_snapshot", gen_snapshot_response());
    let env = test_environment(&fs)
        .define("BuildMode", "profile")
        .process_manager(Arc::new(processes.clone()))
        .build();

    let result = with_timeout(
        sequential().build(registry().get(PROFILE_BUNDLE_LINUX_ASSETS)?, &env),
    )
    .await?;

    assert!(result.success, "{}", flutter_assemble::failure_report(&result));
    assert_eq!(fs.contents(output_path("lib/libapp.so")).unwrap(), b"elf");
    assert_eq!(
        fs.contents(project_path("linux/flutter/ephemeral/libflutter_linux_gtk.so"))
            .unwrap(),
        b"engine linux-x64-profile"
    );

    let commands = processes.commands();
    let dart = commands
        .iter()
        .find(|c| c.program.ends_with("dart"))
        .expect("dart ran");
    assert!(dart.args.contains(&"--aot".to_string()));
    assert!(dart.args.contains(&"-Ddart.vm.profile=true".to_string()));

    let gen_snapshot = commands
        .iter()
        .find(|c| c.program.ends_with("gen_snapshot"))
        .expect("gen_snapshot ran");
    assert_eq!(
        gen_snapshot.program,
        PathBuf::from(ENGINE_DIR).join("linux-x64-profile/gen_snapshot")
    );
    assert!(gen_snapshot.args.contains(&"--snapshot_kind=app-aot-elf".to_string()));
    assert!(gen_snapshot.args.contains(&"--deterministic".to_string()));
    assert!(!gen_snapshot.args.contains(&"--strip".to_string()));
    Ok(())
}

#[tokio::test]
async fn release_bundle_refuses_debug_mode() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", kernel_response());
    let env = test_environment(&fs)
        .define("BuildMode", "debug")
        .process_manager(Arc::new(processes.clone()))
        .build();

    let result = sequential()
        .build(registry().get(RELEASE_BUNDLE_LINUX_ASSETS)?, &env)
        .await?;

    assert!(!result.success);
    assert_eq!(result.failed_targets(), vec!["aot_elf_release"]);
    assert!(result.failures[0].error.to_string().contains("not supported in debug mode"));
    assert_eq!(result.status(UNPACK_LINUX), Some(TargetStatus::Built));
    assert_eq!(
        result.status(RELEASE_BUNDLE_LINUX_ASSETS),
        Some(TargetStatus::Blocked)
    );
    assert_eq!(processes.run_count("gen_snapshot"), 0);
    Ok(())
}

#[tokio::test]
async fn profile_snapshot_refuses_release_mode() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    seed_flutter_sdk(&fs);
    seed_project(&fs);
    let processes = FakeProcessManager::new(fs.clone());
    processes.on("dart", kernel_response());
    processes.on("gen_snapshot", gen_snapshot_response());
    let env = test_environment(&fs)
        .define("BuildMode", "release")
        .process_manager(Arc::new(processes.clone()))
        .build();

    let result = sequential().build(registry().get("aot_elf_profile")?, &env).await?;

    assert!(!result.success);
    assert_eq!(result.failed_targets(), vec!["aot_elf_profile"]);
    let message = result.failures[0].error.to_string();
    assert!(message.contains("cannot build a release snapshot"), "{message}");
    assert_eq!(result.status("kernel_snapshot"), Some(TargetStatus::Built));
    assert_eq!(processes.run_count("gen_snapshot"), 0);
    assert!(!fs.exists(&build_path("app.so")));
    Ok(())
}
