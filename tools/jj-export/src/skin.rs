//! Per-vertex bone influences
//!
//! Every vertex of a skinned scene ends up with exactly four (bone, weight)
//! pairs whose weights sum to one.

use hashbrown::HashMap;
use tracing::warn;

use crate::scene::{MeshData, SceneObject, Skeleton};

/// Influences stored per vertex
pub const MAX_INFLUENCES: usize = 4;

/// Four bone indices and their weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinBinding {
    pub indices: [u32; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl SkinBinding {
    /// Full weight on a single bone
    pub const fn rigid(bone: u32) -> Self {
        Self {
            indices: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

impl Default for SkinBinding {
    fn default() -> Self {
        Self::rigid(0)
    }
}

/// Keep the four heaviest influences and rescale them to sum to one
///
/// Non-positive and non-finite weights are dropped first. With nothing left
/// the vertex gets full weight on bone 0.
pub fn resolve_influences(influences: &mut Vec<(u32, f32)>) -> SkinBinding {
    influences.retain(|&(_, weight)| weight.is_finite() && weight > 0.0);

    if influences.len() > MAX_INFLUENCES {
        influences.select_nth_unstable_by(MAX_INFLUENCES - 1, |a, b| b.1.total_cmp(&a.1));
        influences.truncate(MAX_INFLUENCES);
    }

    let total: f32 = influences.iter().map(|&(_, weight)| weight).sum();
    if influences.is_empty() || total <= 0.0 {
        return SkinBinding::default();
    }

    let mut binding = SkinBinding {
        indices: [0; MAX_INFLUENCES],
        weights: [0.0; MAX_INFLUENCES],
    };
    for (slot, &(bone, weight)) in influences.iter().enumerate() {
        binding.indices[slot] = bone;
        binding.weights[slot] = weight / total;
    }
    binding
}

/// Maps objects onto the scene's single skeleton
pub struct SkinResolver<'a> {
    bones: HashMap<&'a str, u32>,
}

impl<'a> SkinResolver<'a> {
    pub fn new(skeleton: &'a Skeleton) -> Self {
        let bones = skeleton
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| (bone.name.as_str(), i as u32))
            .collect();
        Self { bones }
    }

    fn bone(&self, object: &str, name: &str) -> u32 {
        match self.bones.get(name) {
            Some(&index) => index,
            None => {
                warn!(
                    "Object '{}' references unknown bone '{}', using bone 0",
                    object, name
                );
                0
            }
        }
    }

    /// Binding per authored vertex of `mesh`
    ///
    /// Objects parented to a bone follow it rigidly; armature-bound objects
    /// use their vertex groups; anything else follows bone 0.
    pub fn resolve_object(&self, object: &SceneObject, mesh: &MeshData) -> Vec<SkinBinding> {
        let vertex_count = mesh.positions.len();

        if let Some(bone_name) = &object.parent_bone {
            let binding = SkinBinding::rigid(self.bone(&object.name, bone_name));
            return vec![binding; vertex_count];
        }

        if !object.armature_bound || mesh.vertex_weights.is_empty() {
            return vec![SkinBinding::default(); vertex_count];
        }

        let group_bones: Vec<u32> = mesh
            .vertex_groups
            .iter()
            .map(|group| self.bone(&object.name, group))
            .collect();

        let mut unweighted = 0usize;
        let mut scratch = Vec::with_capacity(MAX_INFLUENCES * 2);
        let bindings = mesh
            .vertex_weights
            .iter()
            .map(|weights| {
                scratch.clear();
                scratch.extend(
                    weights
                        .iter()
                        .map(|&(group, weight)| (group_bones[group as usize], weight)),
                );
                if !scratch.iter().any(|&(_, w)| w > 0.0) {
                    unweighted += 1;
                }
                resolve_influences(&mut scratch)
            })
            .collect();

        if unweighted > 0 {
            warn!(
                "Object '{}': {} vertices have no weights, bound to bone 0",
                object.name, unweighted
            );
        }
        bindings
    }
}
