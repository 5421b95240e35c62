#![allow(dead_code)]

//! A fake Flutter SDK and project laid out in a [`MockFileSystem`].

use std::path::PathBuf;
use std::sync::Arc;

use flutter_assemble::environment::{Environment, EnvironmentBuilder};
use flutter_assemble::fs::mock::MockFileSystem;

use crate::fake_process::{FakeProcessManager, FakeResponse};

pub const PROJECT: &str = "/project";
pub const FLUTTER_ROOT: &str = "/flutter";
pub const BUILD_DIR: &str = "/project/.dart_tool/flutter_build/test";
pub const OUTPUT_DIR: &str = "/project/build";
pub const ENGINE_DIR: &str = "/flutter/bin/cache/artifacts/engine";

pub const LINUX_HEADERS: [&str; 5] = [
    "flutter_linux.h",
    "fl_dart_project.h",
    "fl_engine.h",
    "fl_view.h",
    "fl_method_channel.h",
];

pub fn build_path(relative: &str) -> PathBuf {
    PathBuf::from(BUILD_DIR).join(relative)
}

pub fn project_path(relative: &str) -> PathBuf {
    PathBuf::from(PROJECT).join(relative)
}

pub fn output_path(relative: &str) -> PathBuf {
    PathBuf::from(OUTPUT_DIR).join(relative)
}

/// An environment over `fs` with fixed directories and a process manager
/// that succeeds without doing anything.
pub fn test_environment(fs: &MockFileSystem) -> EnvironmentBuilder {
    Environment::builder(PROJECT)
        .build_dir(BUILD_DIR)
        .output_dir(OUTPUT_DIR)
        .flutter_root(FLUTTER_ROOT)
        .file_system(Arc::new(fs.clone()))
        .process_manager(Arc::new(FakeProcessManager::new(fs.clone())))
}

/// Engine artifacts for linux-x64 in every mode, plus the Dart SDK tools.
pub fn seed_flutter_sdk(fs: &MockFileSystem) {
    for dir in ["linux-x64", "linux-x64-profile", "linux-x64-release"] {
        let engine = PathBuf::from(ENGINE_DIR).join(dir);
        fs.add_file(
            engine.join("libflutter_linux_gtk.so"),
            format!("engine {dir}"),
        );
        fs.add_file(engine.join("gen_snapshot"), format!("gen_snapshot {dir}"));
        for header in LINUX_HEADERS {
            fs.add_file(
                engine.join("flutter_linux").join(header),
                format!("// {header}"),
            );
        }
    }
    fs.add_file(PathBuf::from(ENGINE_DIR).join("linux-x64/icudtl.dat"), "icu");

    for sdk in ["flutter_patched_sdk", "flutter_patched_sdk_product"] {
        fs.add_file(
            PathBuf::from(ENGINE_DIR)
                .join("common")
                .join(sdk)
                .join("platform_strong.dill"),
            format!("platform {sdk}"),
        );
    }

    fs.add_file("/flutter/bin/cache/dart-sdk/bin/dart", "dart");
    fs.add_file(
        "/flutter/bin/cache/dart-sdk/bin/snapshots/frontend_server_aot.dart.snapshot",
        "frontend_server",
    );
}

pub const PUBSPEC: &str = "\
name: demo
flutter:
  assets:
    - assets/logo.png
    - assets/data/
  fonts:
    - family: Roboto
      fonts:
        - asset: fonts/Roboto-Regular.ttf
        - asset: fonts/Roboto-Bold.ttf
          weight: 700
";

/// A minimal app: pubspec with assets and fonts, package config, and an
/// entrypoint.
pub fn seed_project(fs: &MockFileSystem) {
    fs.add_file(project_path("pubspec.yaml"), PUBSPEC);
    fs.add_file(project_path(".dart_tool/package_config.json"), "{}");
    fs.add_file(project_path("lib/main.dart"), "void main() {}");
    fs.add_file(project_path("assets/logo.png"), "png");
    fs.add_file(project_path("assets/data/a.json"), "{\"a\": 1}");
    fs.add_file(project_path("assets/data/b.json"), "{\"b\": 2}");
    fs.add_file(project_path("fonts/Roboto-Regular.ttf"), "regular");
    fs.add_file(project_path("fonts/Roboto-Bold.ttf"), "bold");
}

/// What a successful `frontend_server` run leaves behind.
pub fn kernel_response() -> FakeResponse {
    FakeResponse::success()
        .writes(build_path("app.dill"), "kernel")
        .writes(
            build_path("kernel_snapshot.d"),
            format!(
                "{}: {}\n",
                build_path("app.dill").display(),
                project_path("lib/main.dart").display()
            ),
        )
}

/// What a successful `gen_snapshot` run leaves behind.
pub fn gen_snapshot_response() -> FakeResponse {
    FakeResponse::success().writes(build_path("app.so"), "elf")
}
