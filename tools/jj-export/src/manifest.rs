//! Manifest parsing and build orchestration
//!
//! Parses export.toml and runs the scene, texture and animation exports for
//! every listed scene.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::animation::{export_animations, AnimationOptions, MAX_FRAME_RATE};
use crate::error::ExportError;
use crate::export::{
    export_scene, scene_path, write_scene_file, ExportOptions, SkinningMode,
    DEFAULT_HELPER_PREFIX,
};
use crate::scene::Scene;
use crate::source::{GltfSource, DEFAULT_SOURCE_FPS};
use crate::texture::{
    export_textures, Nvcompress, SkipCompression, TextureCompressor, TextureLayout,
};

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub textures: TexturesConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub scenes: HashMap<String, SceneEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out/")
}

#[derive(Debug, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "default_helper_prefix")]
    pub helper_prefix: String,
    #[serde(default)]
    pub skinning: SkinningMode,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            helper_prefix: default_helper_prefix(),
            skinning: SkinningMode::default(),
        }
    }
}

fn default_helper_prefix() -> String {
    DEFAULT_HELPER_PREFIX.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressorKind {
    #[default]
    Nvcompress,
    #[serde(rename = "none")]
    Skip,
}

impl CompressorKind {
    pub fn compressor(self) -> Box<dyn TextureCompressor> {
        match self {
            CompressorKind::Nvcompress => Box::new(Nvcompress::default()),
            CompressorKind::Skip => Box::new(SkipCompression),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TexturesConfig {
    /// Raw PNG directory, relative to the output directory
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    /// Compressed texture directory, relative to the scene file
    #[serde(default = "default_texture_dir")]
    pub dir: String,
    #[serde(default)]
    pub compressor: CompressorKind,
}

impl Default for TexturesConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            dir: default_texture_dir(),
            compressor: CompressorKind::default(),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("textures_raw")
}

fn default_texture_dir() -> String {
    "textures".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AnimationConfig {
    /// Output sample rate; one sample per authored frame when unset
    #[serde(default)]
    pub frame_rate: Option<f32>,
    /// Frame rate used to turn source seconds into frames
    #[serde(default = "default_source_fps")]
    pub source_fps: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            source_fps: default_source_fps(),
        }
    }
}

fn default_source_fps() -> f32 {
    DEFAULT_SOURCE_FPS
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SceneEntry {
    Simple(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        actions: Vec<String>,
    },
}

impl SceneEntry {
    pub fn path(&self) -> &Path {
        match self {
            SceneEntry::Simple(p) => p,
            SceneEntry::Detailed { path, .. } => path,
        }
    }

    /// Actions to export; empty means every action
    pub fn actions(&self) -> &[String] {
        match self {
            SceneEntry::Simple(_) => &[],
            SceneEntry::Detailed { actions, .. } => actions,
        }
    }
}

impl Manifest {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            helper_prefix: self.scene.helper_prefix.clone(),
            skinning: self.scene.skinning,
            texture_dir: self.textures.dir.clone(),
        }
    }

    pub fn texture_layout(&self, output_dir: &Path) -> TextureLayout {
        TextureLayout {
            output_dir: output_dir.to_path_buf(),
            raw_dir: output_dir.join(&self.textures.raw_dir),
        }
    }

    /// Scene names in build order
    pub fn scene_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    if let Some(fps) = manifest.animation.frame_rate {
        if !(fps.is_finite() && fps > 0.0 && fps <= MAX_FRAME_RATE) {
            anyhow::bail!(
                "Animation frame_rate must be in (0, {}], got {}",
                MAX_FRAME_RATE,
                fps
            );
        }
    }
    if !(manifest.animation.source_fps.is_finite() && manifest.animation.source_fps > 0.0) {
        anyhow::bail!(
            "Animation source_fps must be positive, got {}",
            manifest.animation.source_fps
        );
    }

    for name in manifest.scene_names() {
        let entry = &manifest.scenes[name];
        if !entry.path().exists() {
            anyhow::bail!("Scene '{}' source not found: {:?}", name, entry.path());
        }
        let ext = source_extension(entry.path());
        if !matches!(ext.as_str(), "gltf" | "glb") {
            anyhow::bail!("Unsupported scene format for '{}': {:?}", name, entry.path());
        }
    }
    Ok(())
}

fn source_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Build all scenes from a manifest
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<()> {
    validate(manifest)?;

    let output_dir = output_override.unwrap_or(&manifest.output.dir);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {:?}", output_dir))?;

    let compressor = manifest.textures.compressor.compressor();
    for name in manifest.scene_names() {
        build_scene(
            manifest,
            name,
            &manifest.scenes[name],
            output_dir,
            compressor.as_ref(),
        )?;
    }
    Ok(())
}

/// Export one scene entry: scene file, textures, then animations
pub fn build_scene(
    manifest: &Manifest,
    name: &str,
    entry: &SceneEntry,
    output_dir: &Path,
    compressor: &dyn TextureCompressor,
) -> Result<()> {
    info!("Building scene: {} <- {:?}", name, entry.path());

    let source = GltfSource::open(entry.path(), manifest.animation.source_fps)?;
    let mut scene = source.load_scene()?;
    scene.name = name.to_string();

    let exported = export_scene(&scene, &manifest.export_options())
        .with_context(|| format!("Failed to export scene '{}'", name))?;
    write_scene_file(&exported, &scene_path(output_dir, name))?;
    export_textures(
        &exported.textures,
        &manifest.texture_layout(output_dir),
        compressor,
    )?;

    let wanted = entry.actions();
    if !exports_animations(&scene, wanted)
        .with_context(|| format!("Failed to export animations of '{}'", name))?
    {
        return Ok(());
    }

    let options = AnimationOptions {
        frame_rate: manifest.animation.frame_rate,
        actions: wanted.to_vec(),
    };
    let mut evaluator = source.pose_evaluator()?;
    export_animations(&scene, &mut evaluator, &options, &output_dir.join(name))
        .with_context(|| format!("Failed to export animations of '{}'", name))?;
    Ok(())
}

/// Whether a scene entry has animations to export
///
/// Nothing to do without actions, or without a skeleton when no actions
/// were asked for. Several skeletons are always fatal.
pub fn exports_animations(scene: &Scene, wanted: &[String]) -> Result<bool, ExportError> {
    if scene.actions.is_empty() && wanted.is_empty() {
        return Ok(false);
    }
    match scene.skeletons.len() {
        1 => Ok(true),
        0 if wanted.is_empty() => {
            info!(
                "Scene '{}' has {} actions but no skeleton, skipping animations",
                scene.name,
                scene.actions.len()
            );
            Ok(false)
        }
        count => Err(ExportError::SkeletonCount(count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: Manifest = toml::from_str(
            r#"
            [output]
            dir = "build"

            [scene]
            helper_prefix = "RIG-"
            skinning = "always"

            [textures]
            raw_dir = "raw"
            dir = "tex"
            compressor = "none"

            [animation]
            frame_rate = 60.0
            source_fps = 30.0

            [scenes]
            level = "level.glb"
            hero = { path = "hero.glb", actions = ["Walk", "Run"] }
            "#,
        )
        .unwrap();

        assert_eq!(manifest.output.dir, PathBuf::from("build"));
        assert_eq!(manifest.scene.skinning, SkinningMode::Always);
        assert_eq!(manifest.textures.compressor, CompressorKind::Skip);
        assert_eq!(manifest.animation.frame_rate, Some(60.0));
        assert_eq!(manifest.scene_names(), vec!["hero", "level"]);
        assert_eq!(manifest.scenes["level"].path(), Path::new("level.glb"));
        assert!(manifest.scenes["level"].actions().is_empty());
        assert_eq!(manifest.scenes["hero"].actions(), ["Walk", "Run"]);

        let options = manifest.export_options();
        assert_eq!(options.helper_prefix, "RIG-");
        assert_eq!(options.texture_dir, "tex");
        let layout = manifest.texture_layout(Path::new("build"));
        assert_eq!(layout.raw_dir, PathBuf::from("build/raw"));
    }

    #[test]
    fn test_defaults() {
        let manifest: Manifest = toml::from_str("").unwrap();
        assert_eq!(manifest.output.dir, PathBuf::from("out/"));
        assert_eq!(manifest.scene.helper_prefix, "WGT-");
        assert_eq!(manifest.scene.skinning, SkinningMode::Auto);
        assert_eq!(manifest.textures.compressor, CompressorKind::Nvcompress);
        assert_eq!(manifest.textures.dir, "textures");
        assert_eq!(manifest.animation.frame_rate, None);
        assert_eq!(manifest.animation.source_fps, 24.0);
        assert!(manifest.scenes.is_empty());
    }

    #[test]
    fn test_unknown_skinning_mode_rejected() {
        let result: Result<Manifest, _> = toml::from_str("[scene]\nskinning = \"sometimes\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_missing_source() {
        let manifest: Manifest =
            toml::from_str("[scenes]\nlevel = \"does/not/exist.glb\"").unwrap();
        let err = validate(&manifest).unwrap_err();
        assert!(err.to_string().contains("level"));
    }

    #[test]
    fn test_validate_frame_rate() {
        let manifest: Manifest = toml::from_str("[animation]\nframe_rate = 0.0").unwrap();
        assert!(validate(&manifest).is_err());
        let manifest: Manifest = toml::from_str("[animation]\nframe_rate = 1e30").unwrap();
        assert!(validate(&manifest).is_err());
    }

    #[test]
    fn test_animation_skeleton_requirements() {
        use crate::scene::{Action, Skeleton};

        let skeleton = |name: &str| Skeleton {
            name: name.into(),
            bones: Vec::new(),
        };
        let mut scene = Scene {
            name: "hero".into(),
            ..Default::default()
        };
        assert!(!exports_animations(&scene, &[]).unwrap());

        scene.actions.push(Action {
            name: "Walk".into(),
            frame_start: 0,
            frame_end: 10,
        });
        assert!(!exports_animations(&scene, &[]).unwrap());
        assert!(matches!(
            exports_animations(&scene, &["Walk".to_string()]),
            Err(ExportError::SkeletonCount(0))
        ));

        scene.skeletons.push(skeleton("A"));
        assert!(exports_animations(&scene, &[]).unwrap());

        scene.skeletons.push(skeleton("B"));
        assert!(matches!(
            exports_animations(&scene, &[]),
            Err(ExportError::SkeletonCount(2))
        ));
    }
}
