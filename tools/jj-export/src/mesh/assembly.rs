//! Per-object geometry assembly
//!
//! Turns an object's indexed triangles into per-corner world-space records.
//! UVs are flipped from the authoring convention (origin bottom-left) to the
//! runtime one (origin top-left).

use glam::Vec3;
use tracing::warn;

use super::consolidate::{MeshConsolidator, Triangle};
use crate::material::EncodedMaterials;
use crate::scene::{MeshData, SceneObject};
use crate::skin::SkinBinding;
use crate::transform::ObjectTransform;

/// UV written for meshes without a UV layer
pub const MISSING_UV: [f32; 2] = [0.5, 0.5];

/// Repairs and fallbacks applied to one object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub triangles: usize,
    pub repaired_normals: usize,
    pub missing_uvs: bool,
    pub missing_materials: bool,
}

/// Authoring UV to runtime UV
pub fn flip_uv([u, v]: [f32; 2]) -> [f32; 2] {
    [u, 1.0 - v]
}

/// Append one object's triangles to the consolidator
///
/// `skin` holds one binding per authored vertex when the scene is skinned.
pub fn assemble_object(
    consolidator: &mut MeshConsolidator,
    object: &SceneObject,
    mesh: &MeshData,
    materials: &EncodedMaterials,
    skin: Option<&[SkinBinding]>,
) -> AssemblyStats {
    let transform = ObjectTransform::new(object.world_transform);
    let mut stats = AssemblyStats {
        triangles: mesh.triangle_count(),
        missing_uvs: mesh.corner_uvs.is_none(),
        missing_materials: mesh.material_slots.is_empty(),
        ..Default::default()
    };

    for (t, tri) in mesh.triangles.iter().enumerate() {
        let slot = mesh.slot_of(t);
        let material_id = materials.id_of(mesh.material_slots.get(slot).copied().flatten());

        let mut triangle = Triangle {
            positions: [[0.0; 3]; 3],
            shade: [[0.0; 5]; 3],
            material_id,
        };

        for (c, &vertex) in tri.iter().enumerate() {
            let corner = t * 3 + c;

            let position = transform.position(Vec3::from(mesh.positions[vertex as usize]));
            let (normal, repaired) = transform.normal(Vec3::from(mesh.corner_normals[corner]));
            if repaired {
                stats.repaired_normals += 1;
            }
            let [u, v] = mesh
                .corner_uvs
                .as_ref()
                .map(|uvs| flip_uv(uvs[corner]))
                .unwrap_or(MISSING_UV);

            triangle.positions[c] = position.to_array();
            triangle.shade[c] = [normal.x, normal.y, normal.z, u, v];
        }

        let bindings = skin.map(|bindings| tri.map(|vertex| bindings[vertex as usize]));
        consolidator.push(&triangle, bindings);
    }

    if stats.repaired_normals > 0 {
        warn!(
            "Object '{}': replaced {} invalid normals",
            object.name, stats.repaired_normals
        );
    }
    if stats.missing_uvs {
        warn!("Object '{}' has no UV layer, using {:?}", object.name, MISSING_UV);
    }
    if stats.missing_materials {
        warn!("Object '{}' has no material slots, using material 0", object.name);
    }
    stats
}
