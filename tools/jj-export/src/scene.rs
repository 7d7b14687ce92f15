//! Authoring-tool scene model
//!
//! Plain arrays handed over by the authoring tool (or a file adapter such as
//! [`crate::source::gltf`]). Nothing here knows about the output format.

use anyhow::Result;
use glam::Mat4;
use image::DynamicImage;
use std::sync::Arc;

use crate::error::ExportError;

/// One authoring session's worth of scene data
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Source file stem; names the exported scene file
    pub name: String,
    pub objects: Vec<SceneObject>,
    pub materials: Vec<Material>,
    pub skeletons: Vec<Skeleton>,
    pub actions: Vec<Action>,
    /// Authored frames per second
    pub frame_rate: f32,
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    /// Local-to-world transform
    pub world_transform: Mat4,
    /// False for objects the author excluded from export
    pub exportable: bool,
    /// Bone this object is rigidly parented to, if any
    pub parent_bone: Option<String>,
    /// True when the object deforms through vertex groups of the armature
    pub armature_bound: bool,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Mesh(MeshData),
    Armature,
    Other,
}

impl SceneObject {
    /// Static, unparented mesh object with an identity transform
    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Mesh(mesh),
            world_transform: Mat4::IDENTITY,
            exportable: true,
            parent_bone: None,
            armature_bound: false,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// Per-object triangle topology and attributes
///
/// Corner arrays hold three entries per triangle, in triangle order.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Per-vertex positions (object space)
    pub positions: Vec<[f32; 3]>,
    /// Vertex indices per triangle
    pub triangles: Vec<[u32; 3]>,
    /// Per-corner normals (object space, may be zero when unauthored)
    pub corner_normals: Vec<[f32; 3]>,
    /// Per-corner UVs in authoring convention (origin bottom-left); `None` when
    /// the mesh has no UV layer
    pub corner_uvs: Option<Vec<[f32; 2]>>,
    /// Material slot per triangle (empty: every triangle uses slot 0)
    pub triangle_slots: Vec<u16>,
    /// Scene material index per slot
    pub material_slots: Vec<Option<usize>>,
    /// Vertex group names, indexed by the group ids in `vertex_weights`
    pub vertex_groups: Vec<String>,
    /// Per-vertex (group id, weight) lists; empty when the mesh has no groups
    pub vertex_weights: Vec<Vec<(u32, f32)>>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Material slot of a triangle
    pub fn slot_of(&self, triangle: usize) -> usize {
        self.triangle_slots.get(triangle).copied().unwrap_or(0) as usize
    }

    /// Check that all arrays agree with each other
    pub fn validate(&self, object: &str) -> Result<(), ExportError> {
        let malformed = |reason: String| ExportError::MalformedMesh {
            object: object.to_string(),
            reason,
        };

        let corners = self.triangles.len() * 3;
        let vertex_count = self.positions.len();

        if let Some((t, tri)) = self
            .triangles
            .iter()
            .enumerate()
            .find(|(_, tri)| tri.iter().any(|&v| v as usize >= vertex_count))
        {
            return Err(malformed(format!(
                "triangle {} references vertex {:?}, but the mesh has {} vertices",
                t, tri, vertex_count
            )));
        }
        if self.corner_normals.len() != corners {
            return Err(malformed(format!(
                "{} corner normals for {} corners",
                self.corner_normals.len(),
                corners
            )));
        }
        if let Some(uvs) = &self.corner_uvs {
            if uvs.len() != corners {
                return Err(malformed(format!(
                    "{} corner UVs for {} corners",
                    uvs.len(),
                    corners
                )));
            }
        }
        if !self.triangle_slots.is_empty() && self.triangle_slots.len() != self.triangles.len() {
            return Err(malformed(format!(
                "{} triangle slots for {} triangles",
                self.triangle_slots.len(),
                self.triangles.len()
            )));
        }
        if !self.material_slots.is_empty() {
            if let Some(slot) = self
                .triangle_slots
                .iter()
                .find(|&&s| s as usize >= self.material_slots.len())
            {
                return Err(malformed(format!(
                    "triangle uses slot {}, but the mesh has {} material slots",
                    slot,
                    self.material_slots.len()
                )));
            }
        }
        if !self.vertex_weights.is_empty() {
            if self.vertex_weights.len() != vertex_count {
                return Err(malformed(format!(
                    "{} vertex weight lists for {} vertices",
                    self.vertex_weights.len(),
                    vertex_count
                )));
            }
            let group_count = self.vertex_groups.len();
            if let Some((v, group)) = self.vertex_weights.iter().enumerate().find_map(|(v, list)| {
                list.iter()
                    .find(|(g, _)| *g as usize >= group_count)
                    .map(|(g, _)| (v, *g))
            }) {
                return Err(malformed(format!(
                    "vertex {} references group {}, but the mesh has {} groups",
                    v, group, group_count
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Image referenced from a material graph
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub name: String,
    pub image: Arc<DynamicImage>,
}

/// What feeds a shading-node input
#[derive(Debug, Clone, Default)]
pub enum InputLink {
    /// Nothing connected: the socket's default value applies
    #[default]
    Unlinked,
    /// Image texture node
    Image(ImageRef),
    /// Normal-map adapter node wrapping another input
    NormalMap(Box<InputLink>),
    /// Any node kind the exporter does not evaluate
    Unsupported { node_kind: String },
}

/// Shading-node input socket
#[derive(Debug, Clone)]
pub struct Socket<T> {
    pub default: T,
    pub link: InputLink,
}

impl<T> Socket<T> {
    pub fn value(default: T) -> Self {
        Self {
            default,
            link: InputLink::Unlinked,
        }
    }

    pub fn linked(default: T, link: InputLink) -> Self {
        Self { default, link }
    }
}

/// Inputs of the principal shading node
#[derive(Debug, Clone)]
pub struct PrincipledInputs {
    pub base_color: Socket<[f32; 4]>,
    pub metallic: Socket<f32>,
    pub roughness: Socket<f32>,
    pub normal: InputLink,
}

impl Default for PrincipledInputs {
    fn default() -> Self {
        Self {
            base_color: Socket::value([0.8, 0.8, 0.8, 1.0]),
            metallic: Socket::value(0.0),
            roughness: Socket::value(0.5),
            normal: InputLink::Unlinked,
        }
    }
}

/// Node wired into the material's surface output
#[derive(Debug, Clone)]
pub enum SurfaceOutput {
    /// No output node, or nothing connected to it
    Missing,
    Principled(PrincipledInputs),
    Unsupported { node_kind: String },
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// Number of objects/primitives using the material
    pub users: u32,
    pub surface: SurfaceOutput,
}

// ============================================================================
// Skeleton and animation
// ============================================================================

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Armature space to bone rest space
    pub inverse_bind: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }
}

/// Animation clip with an inclusive authored frame range
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub frame_start: i32,
    pub frame_end: i32,
}

/// Authoring-tool time: whole frame plus fractional subframe
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    pub frame: i32,
    pub subframe: f32,
}

impl FrameTime {
    pub fn new(frame: i32, subframe: f32) -> Self {
        Self { frame, subframe }
    }

    /// Split a fractional frame number into frame and subframe
    pub fn from_fractional(time: f64) -> Self {
        let frame = time.floor();
        Self {
            frame: frame as i32,
            subframe: (time - frame) as f32,
        }
    }

    pub fn as_fractional(&self) -> f64 {
        self.frame as f64 + self.subframe as f64
    }
}

/// Pose evaluation supplied by the authoring tool
///
/// The current frame and active action are state shared with the rest of
/// the tool; callers sampling poses go through
/// [`crate::animation::PoseGuard`] so both are put back afterwards.
pub trait PoseEvaluator {
    /// Current frame and subframe
    fn frame(&self) -> FrameTime;

    /// Move the tool to a frame; re-evaluates the pose
    fn set_frame(&mut self, time: FrameTime);

    /// Action currently driving the pose, if any
    fn action(&self) -> Option<String>;

    /// Select the action driving the pose
    fn set_action(&mut self, name: &str) -> Result<()>;

    /// Return to the rest pose with no action selected
    fn clear_action(&mut self);

    /// Bone-to-armature matrix per bone at the current frame, in skeleton order
    fn bone_to_armature(&self) -> Result<Vec<Mat4>>;
}
