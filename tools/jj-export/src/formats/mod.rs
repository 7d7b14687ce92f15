//! Binary writers for the jj scene and animation files
//!
//! Re-exports the format definitions from jj-common.

mod writer;

pub use jj_common::formats::*;
pub use writer::{
    GeometryWritten, HeaderWritten, Idle, MaterialsWritten, SceneWriter, SkinDataWritten,
    TexturesWritten,
};

use std::io::Write;

use crate::animation::SampledAnimation;
use crate::error::ExportError;
use crate::export::ExportedScene;

/// Write a complete scene file
///
/// Texture names are encoded before anything is written, so an over-long
/// path never leaves a partial file behind in `w`.
pub fn write_scene<W: Write>(w: W, scene: &ExportedScene) -> Result<W, ExportError> {
    let texture_names = scene
        .textures
        .table_paths()
        .map(encode_texture_name)
        .collect::<Result<Vec<_>, _>>()?;

    let mesh = &scene.mesh;
    let triangle_count = u32::try_from(mesh.triangle_count())
        .map_err(|_| ExportError::TooManyTriangles(mesh.triangle_count()))?;
    let header = SceneHeader::new(
        triangle_count,
        scene.materials.len() as u32,
        texture_names.len() as u32,
        mesh.is_skinned(),
    );

    let writer = SceneWriter::new(w)
        .write_header(header)?
        .write_geometry(&mesh.positions, &mesh.shade, &mesh.material_ids)?
        .write_materials(&scene.materials)?
        .write_textures(&texture_names)?;

    match &mesh.skin {
        Some(skin) => writer.write_skin(&skin.indices, &skin.weights)?.finish(),
        None => writer.finish(),
    }
}

/// Write a complete animation file
///
/// Forward matrices for every frame come first, then the adjugate matrices;
/// within each block matrices are frame-major and stored row-major.
pub fn write_animation<W: Write>(
    w: &mut W,
    animation: &SampledAnimation,
) -> Result<(), ExportError> {
    let header = AnimationHeader::new(animation.frame_count, animation.bone_count);
    let expected = header.matrix_count();
    let blocks = [
        ("forward matrix", &animation.forward),
        ("adjugate matrix", &animation.adjugate),
    ];
    for (block, matrices) in blocks {
        if matrices.len() != expected {
            return Err(FormatError::LengthMismatch {
                block,
                expected,
                actual: matrices.len(),
            }
            .into());
        }
    }

    let mut bytes = Vec::with_capacity(header.file_size());
    bytes.extend_from_slice(&header.to_bytes());
    for matrix in animation.forward.iter().chain(&animation.adjugate) {
        for value in matrix_to_row_major(matrix) {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    w.write_all(&bytes)?;
    Ok(())
}
