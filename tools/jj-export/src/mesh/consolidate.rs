//! Pre-sized accumulation of all objects' triangles

use crate::skin::SkinBinding;

/// Per-corner shading record: normal (3) + uv (2)
pub type ShadeRecord = [f32; 5];

/// Bone indices and weights, one entry per corner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinArrays {
    pub indices: Vec<[u32; 4]>,
    pub weights: Vec<[f32; 4]>,
}

/// Every exported triangle of a scene, as flat per-corner arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedMesh {
    pub positions: Vec<[f32; 3]>,
    pub shade: Vec<ShadeRecord>,
    /// One id per triangle
    pub material_ids: Vec<u16>,
    pub skin: Option<SkinArrays>,
}

impl ConsolidatedMesh {
    pub fn triangle_count(&self) -> usize {
        self.material_ids.len()
    }

    pub fn corner_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }
}

/// One triangle ready for the consolidated arrays
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub positions: [[f32; 3]; 3],
    pub shade: [ShadeRecord; 3],
    pub material_id: u16,
}

/// Appends triangles into arrays sized once for the whole scene
#[derive(Debug)]
pub struct MeshConsolidator {
    mesh: ConsolidatedMesh,
    capacity: usize,
}

impl MeshConsolidator {
    /// `triangle_count` is the scene total; no array grows past it
    pub fn with_capacity(triangle_count: usize, skinned: bool) -> Self {
        let corners = triangle_count * 3;
        Self {
            mesh: ConsolidatedMesh {
                positions: Vec::with_capacity(corners),
                shade: Vec::with_capacity(corners),
                material_ids: Vec::with_capacity(triangle_count),
                skin: skinned.then(|| SkinArrays {
                    indices: Vec::with_capacity(corners),
                    weights: Vec::with_capacity(corners),
                }),
            },
            capacity: triangle_count,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.triangle_count())
    }

    /// Append one triangle
    ///
    /// In a skinned scene a triangle without bindings follows bone 0; in an
    /// unskinned scene bindings are ignored.
    pub fn push(&mut self, triangle: &Triangle, skin: Option<[SkinBinding; 3]>) {
        debug_assert!(self.remaining() > 0, "consolidator capacity exceeded");

        self.mesh.positions.extend_from_slice(&triangle.positions);
        self.mesh.shade.extend_from_slice(&triangle.shade);
        self.mesh.material_ids.push(triangle.material_id);

        if let Some(arrays) = &mut self.mesh.skin {
            let bindings = skin.unwrap_or_default();
            for binding in bindings {
                arrays.indices.push(binding.indices);
                arrays.weights.push(binding.weights);
            }
        }
    }

    pub fn finish(self) -> ConsolidatedMesh {
        self.mesh
    }
}
