//! Scene export session
//!
//! Runs the whole static-scene pipeline: skeleton check, material encoding,
//! object filtering, consolidation and skin resolution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use jj_common::{encode_texture_name, MaterialRecord, JJ_FORMAT};

use crate::error::ExportError;
use crate::formats::write_scene;
use crate::material::{encode_materials, TextureRegistry};
use crate::mesh::{assemble_object, ConsolidatedMesh, MeshConsolidator};
use crate::scene::{MeshData, Scene, SceneObject, Skeleton};
use crate::skin::SkinResolver;

/// Object name prefix reserved for rig helpers
pub const DEFAULT_HELPER_PREFIX: &str = "WGT-";

/// When to write skin data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinningMode {
    /// Skin data iff the scene has one skeleton; several are fatal
    #[default]
    Auto,
    /// Require exactly one skeleton
    Always,
    Never,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub helper_prefix: String,
    pub skinning: SkinningMode,
    /// Texture table directory, relative to the scene file
    pub texture_dir: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            helper_prefix: DEFAULT_HELPER_PREFIX.to_string(),
            skinning: SkinningMode::Auto,
            texture_dir: "textures".to_string(),
        }
    }
}

/// Everything that goes into one scene file
#[derive(Debug, Clone)]
pub struct ExportedScene {
    pub name: String,
    pub mesh: ConsolidatedMesh,
    pub materials: Vec<MaterialRecord>,
    pub textures: TextureRegistry,
}

/// Skeleton driving the skin data, if any
///
/// Several skeletons are fatal unless skinning is off.
pub fn select_skeleton(
    scene: &Scene,
    mode: SkinningMode,
) -> Result<Option<&Skeleton>, ExportError> {
    match (mode, scene.skeletons.as_slice()) {
        (SkinningMode::Never, _) => Ok(None),
        (_, [skeleton]) => Ok(Some(skeleton)),
        (SkinningMode::Auto, []) => Ok(None),
        (_, skeletons) => Err(ExportError::SkeletonCount(skeletons.len())),
    }
}

/// Mesh objects that end up in the file
pub fn exported_objects<'a>(
    scene: &'a Scene,
    helper_prefix: &'a str,
) -> impl Iterator<Item = (&'a SceneObject, &'a MeshData)> + 'a {
    scene.objects.iter().filter_map(move |object| {
        let mesh = object.as_mesh()?;
        if !object.exportable {
            debug!("Skipping non-exportable object '{}'", object.name);
            return None;
        }
        if !helper_prefix.is_empty() && object.name.starts_with(helper_prefix) {
            debug!("Skipping helper object '{}'", object.name);
            return None;
        }
        Some((object, mesh))
    })
}

/// Consolidate a scene into file-ready arrays
pub fn export_scene(scene: &Scene, options: &ExportOptions) -> Result<ExportedScene, ExportError> {
    let skeleton = select_skeleton(scene, options.skinning)?;
    let materials = encode_materials(&scene.materials, &options.texture_dir)?;

    let objects: Vec<_> = exported_objects(scene, &options.helper_prefix).collect();
    for (object, mesh) in &objects {
        mesh.validate(&object.name)?;
    }

    let triangle_count: usize = objects.iter().map(|(_, mesh)| mesh.triangle_count()).sum();
    if u32::try_from(triangle_count).is_err() {
        return Err(ExportError::TooManyTriangles(triangle_count));
    }

    let resolver = skeleton.map(SkinResolver::new);
    let mut consolidator = MeshConsolidator::with_capacity(triangle_count, skeleton.is_some());

    for (object, mesh) in &objects {
        let bindings = resolver
            .as_ref()
            .map(|resolver| resolver.resolve_object(object, mesh));
        let stats = assemble_object(
            &mut consolidator,
            object,
            mesh,
            &materials,
            bindings.as_deref(),
        );
        debug!("Object '{}': {} triangles", object.name, stats.triangles);
    }

    let mesh = consolidator.finish();
    info!(
        "Scene '{}': {} objects, {} triangles, {} materials, {} textures{}",
        scene.name,
        objects.len(),
        mesh.triangle_count(),
        materials.records.len(),
        materials.textures.len(),
        if mesh.is_skinned() { ", skinned" } else { "" }
    );

    Ok(ExportedScene {
        name: scene.name.clone(),
        mesh,
        materials: materials.records,
        textures: materials.textures,
    })
}

/// Scene file path for a scene name
pub fn scene_path(output_dir: &Path, scene_name: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", scene_name, JJ_FORMAT.scene_ext))
}

/// Write a scene file; nothing is created if the texture table is invalid
pub fn write_scene_file(exported: &ExportedScene, path: &Path) -> Result<()> {
    for table_path in exported.textures.table_paths() {
        encode_texture_name(table_path).map_err(ExportError::from)?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?;
    let mut writer = write_scene(BufWriter::new(file), exported)?;
    writer.flush()?;

    info!(
        "Wrote {:?} ({} triangles, {} materials, {} textures)",
        path,
        exported.mesh.triangle_count(),
        exported.materials.len(),
        exported.textures.len()
    );
    Ok(())
}
