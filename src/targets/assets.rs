// src/targets/assets.rs

//! Asset bundling: reading the `flutter:` section of `pubspec.yaml` and
//! copying the listed files into `<OUTPUT_DIR>/flutter_assets`.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::depfile::Depfile;
use crate::environment::Environment;
use crate::errors;
use crate::exec::{copy_files, CopyMode};
use crate::source::{Source, SourceBehavior};
use crate::target::{BoxFuture, Target};
use crate::targets::COPY_ASSETS;

/// Directory under `OUTPUT_DIR` that receives the bundled assets.
pub const FLUTTER_ASSETS_DIR: &str = "flutter_assets";
pub const ASSET_MANIFEST: &str = "AssetManifest.json";
pub const FONT_MANIFEST: &str = "FontManifest.json";
pub const COPY_ASSETS_DEPFILE: &str = "copy_assets.d";

/// One file to bundle. `key` is the forward-slash path inside the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub key: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontAsset {
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontFamily {
    pub family: String,
    pub fonts: Vec<FontAsset>,
}

/// Everything an asset bundle resolved to, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetBundleContents {
    pub assets: Vec<AssetEntry>,
    pub fonts: Vec<FontFamily>,
}

/// Produces the list of files that belong in `flutter_assets`.
pub trait AssetBundle: Send + Sync + Debug {
    fn build(&self, env: &Environment) -> Result<AssetBundleContents>;
}

#[derive(Debug, Deserialize, Default)]
struct Pubspec {
    #[serde(default)]
    flutter: Option<FlutterSection>,
}

#[derive(Debug, Deserialize, Default)]
struct FlutterSection {
    #[serde(default)]
    assets: Vec<AssetDecl>,
    #[serde(default)]
    fonts: Vec<FontFamilyDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AssetDecl {
    Path(String),
    Detailed { path: String },
}

impl AssetDecl {
    fn path(&self) -> &str {
        match self {
            AssetDecl::Path(p) | AssetDecl::Detailed { path: p } => p,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FontFamilyDecl {
    family: String,
    #[serde(default)]
    fonts: Vec<FontDecl>,
}

#[derive(Debug, Deserialize)]
struct FontDecl {
    asset: String,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    style: Option<String>,
}

/// Reads `flutter.assets` and `flutter.fonts` from `<PROJECT_DIR>/pubspec.yaml`.
///
/// An entry ending in `/` bundles every file directly inside that directory
/// (not recursively). Declared files that do not exist are an error.
#[derive(Debug, Clone, Default)]
pub struct PubspecAssetBundle;

impl PubspecAssetBundle {
    pub fn pubspec_path(env: &Environment) -> PathBuf {
        env.project_dir().join("pubspec.yaml")
    }
}

impl AssetBundle for PubspecAssetBundle {
    fn build(&self, env: &Environment) -> Result<AssetBundleContents> {
        let fs = env.file_system();
        let pubspec_path = Self::pubspec_path(env);
        let contents = fs.read_to_string(&pubspec_path)?;
        let pubspec: Pubspec = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing {:?}", pubspec_path))?;
        let flutter = pubspec.flutter.unwrap_or_default();

        let mut assets: BTreeMap<String, PathBuf> = BTreeMap::new();

        for decl in &flutter.assets {
            let declared = decl.path();
            if let Some(dir) = declared.strip_suffix('/') {
                let path = env.project_dir().join(dir);
                if !fs.is_dir(&path) {
                    bail!("asset directory `{declared}` does not exist");
                }
                for entry in fs.read_dir(&path)? {
                    if !fs.is_file(&entry) {
                        continue;
                    }
                    if let Some(name) = entry.file_name() {
                        let key = format!("{declared}{}", name.to_string_lossy());
                        assets.insert(key, entry);
                    }
                }
            } else {
                let path = env.project_dir().join(declared);
                if !fs.is_file(&path) {
                    bail!("asset `{declared}` does not exist");
                }
                assets.insert(asset_key(declared), path);
            }
        }

        let mut fonts = Vec::with_capacity(flutter.fonts.len());
        for family in flutter.fonts {
            let mut family_fonts = Vec::with_capacity(family.fonts.len());
            for font in family.fonts {
                let path = env.project_dir().join(&font.asset);
                if !fs.is_file(&path) {
                    bail!("font asset `{}` of family `{}` does not exist", font.asset, family.family);
                }
                let key = asset_key(&font.asset);
                assets.insert(key.clone(), path);
                family_fonts.push(FontAsset {
                    asset: key,
                    weight: font.weight,
                    style: font.style,
                });
            }
            fonts.push(FontFamily {
                family: family.family,
                fonts: family_fonts,
            });
        }

        debug!(assets = assets.len(), families = fonts.len(), "resolved asset bundle");
        Ok(AssetBundleContents {
            assets: assets
                .into_iter()
                .map(|(key, source)| AssetEntry { key, source })
                .collect(),
            fonts,
        })
    }
}

fn asset_key(declared: &str) -> String {
    declared.replace('\\', "/")
}

/// Bundled assets as a [`Source`]: inputs are the asset files, outputs their
/// destinations under `flutter_assets`.
#[derive(Debug, Clone)]
pub struct AssetsBehavior {
    bundle: Arc<dyn AssetBundle>,
}

impl AssetsBehavior {
    pub fn new(bundle: Arc<dyn AssetBundle>) -> Self {
        Self { bundle }
    }
}

impl SourceBehavior for AssetsBehavior {
    fn inputs(&self, env: &Environment) -> errors::Result<Vec<PathBuf>> {
        let contents = self.bundle.build(env)?;
        Ok(contents.assets.into_iter().map(|a| a.source).collect())
    }

    fn outputs(&self, env: &Environment) -> errors::Result<Vec<PathBuf>> {
        let contents = self.bundle.build(env)?;
        let dir = assets_dir(env);
        Ok(contents
            .assets
            .iter()
            .map(|a| dir.join(&a.key))
            .collect())
    }
}

pub fn assets_dir(env: &Environment) -> PathBuf {
    env.output_dir().join(FLUTTER_ASSETS_DIR)
}

/// Copy the bundle into `flutter_assets`, write the asset and font
/// manifests, and return a depfile describing what was read and written.
///
/// Files whose destination already has identical contents are not
/// rewritten. The manifests are always rewritten.
pub async fn copy_assets(env: &Environment, bundle: &dyn AssetBundle) -> Result<Depfile> {
    let fs = env.file_system();
    let contents = bundle.build(env)?;
    let dir = assets_dir(env);

    let mut depfile = Depfile::default();
    depfile.track_input(PubspecAssetBundle::pubspec_path(env));

    let pairs: Vec<(PathBuf, PathBuf)> = contents
        .assets
        .iter()
        .map(|a| (a.source.clone(), dir.join(&a.key)))
        .collect();
    for (source, destination) in &pairs {
        depfile.track_input(source.clone());
        depfile.track_output(destination.clone());
    }

    let copied = copy_files(Arc::clone(fs), pairs, CopyMode::IfChanged).await?;

    let manifest: BTreeMap<&str, Vec<&str>> = contents
        .assets
        .iter()
        .map(|a| (a.key.as_str(), vec![a.key.as_str()]))
        .collect();
    let asset_manifest = dir.join(ASSET_MANIFEST);
    write_json(env, &asset_manifest, &manifest)?;
    depfile.track_output(asset_manifest);

    let font_manifest = dir.join(FONT_MANIFEST);
    write_json(env, &font_manifest, &contents.fonts)?;
    depfile.track_output(font_manifest);

    info!(
        assets = contents.assets.len(),
        copied,
        dir = ?dir,
        "bundled assets"
    );
    Ok(depfile)
}

fn write_json<T: Serialize + ?Sized>(env: &Environment, path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {:?}", path))?;
    env.file_system().write(path, json.as_bytes())
}

/// Sources shared by every target that bundles assets.
pub(crate) fn asset_inputs(bundle: &Arc<dyn AssetBundle>) -> Vec<Source> {
    vec![
        Source::pattern("{PROJECT_DIR}/pubspec.yaml"),
        Source::behavior(AssetsBehavior::new(Arc::clone(bundle))),
    ]
}

pub(crate) fn asset_outputs(bundle: &Arc<dyn AssetBundle>) -> Vec<Source> {
    vec![
        Source::pattern(format!("{{OUTPUT_DIR}}/{FLUTTER_ASSETS_DIR}/{ASSET_MANIFEST}")),
        Source::pattern(format!("{{OUTPUT_DIR}}/{FLUTTER_ASSETS_DIR}/{FONT_MANIFEST}")),
        Source::behavior(AssetsBehavior::new(Arc::clone(bundle))),
    ]
}

/// Copies the project's assets into `<OUTPUT_DIR>/flutter_assets`.
#[derive(Debug, Clone)]
pub struct CopyAssets {
    bundle: Arc<dyn AssetBundle>,
}

impl CopyAssets {
    pub fn new(bundle: Arc<dyn AssetBundle>) -> Self {
        Self { bundle }
    }
}

impl Target for CopyAssets {
    fn name(&self) -> &str {
        COPY_ASSETS
    }

    fn inputs(&self) -> Vec<Source> {
        asset_inputs(&self.bundle)
    }

    /// Only the bundled files; other targets also write into `flutter_assets`.
    fn outputs(&self) -> Vec<Source> {
        asset_outputs(&self.bundle)
    }

    fn depfiles(&self) -> Vec<String> {
        vec![COPY_ASSETS_DEPFILE.to_string()]
    }

    fn build<'a>(&'a self, env: &'a Environment) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let depfile = copy_assets(env, self.bundle.as_ref()).await?;
            env.depfile_service()
                .write(&depfile, &env.build_dir().join(COPY_ASSETS_DEPFILE))
        })
    }
}
