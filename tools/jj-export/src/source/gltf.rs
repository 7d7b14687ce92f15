//! glTF 2.0 scene adapter
//!
//! Maps a `.gltf`/`.glb` file onto the authoring-tool scene model:
//! - every node with a mesh is one object, its primitives become material slots
//! - `JOINTS_n`/`WEIGHTS_n` sets become vertex groups named after the joints
//! - skins become skeletons, animations become actions
//!
//! glTF UVs have their origin at the top left; they are converted to the
//! authoring convention (bottom left) here.

use anyhow::{Context, Result};
use glam::Mat4;
use gltf::image::Format;
use hashbrown::{HashMap, HashSet};
use image::{DynamicImage, GrayAlphaImage, GrayImage, Luma, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{animation_name, GltfPoseEvaluator};
use crate::error::ExportError;
use crate::scene::{
    Action, Bone, ImageRef, InputLink, Material, MeshData, ObjectKind, PrincipledInputs, Scene,
    SceneObject, Skeleton, Socket, SurfaceOutput,
};

/// Authoring-convention UV for primitives without texture coordinates
const MISSING_UV: [f32; 2] = [0.5, 0.5];

/// Weight sets read per vertex (four influences each)
const WEIGHT_SETS: u32 = 2;

type DecodedImages = Vec<Option<Arc<DynamicImage>>>;

/// A loaded glTF file
pub struct GltfSource {
    path: PathBuf,
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    images: Vec<gltf::image::Data>,
    frame_rate: f32,
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn image_name(image: &gltf::Image) -> String {
    image
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("image_{}", image.index()))
}

/// Convert decoded 8-bit glTF pixels; other formats are not supported
fn to_dynamic_image(data: &gltf::image::Data) -> Option<DynamicImage> {
    let (width, height) = (data.width, data.height);
    let pixels = data.pixels.clone();
    match data.format {
        Format::R8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        Format::R8G8 => {
            GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        Format::R8G8B8 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => {
            RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        }
        _ => None,
    }
}

/// Single channel of an image as a grayscale image
fn extract_channel(image: &DynamicImage, channel: usize) -> DynamicImage {
    let rgba = image.to_rgba8();
    DynamicImage::ImageLuma8(GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([rgba.get_pixel(x, y)[channel]])
    }))
}

impl GltfSource {
    /// Load a glTF file; `frame_rate` converts animation seconds to frames
    pub fn open(path: &Path, frame_rate: f32) -> Result<Self> {
        let (document, buffers, images) =
            gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;

        debug!(
            "Loaded {:?}: {} nodes, {} meshes, {} materials, {} skins, {} animations",
            path,
            document.nodes().count(),
            document.meshes().count(),
            document.materials().count(),
            document.skins().count(),
            document.animations().count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            document,
            buffers,
            images,
            frame_rate,
        })
    }

    /// File stem of the source; names the exported scene file
    pub fn scene_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string())
    }

    /// Build the scene model
    pub fn load_scene(&self) -> Result<Scene> {
        let images = self.decode_images();

        let mut parents = vec![None; self.document.nodes().count()];
        for node in self.document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }

        let joint_names: HashMap<usize, String> = self
            .document
            .skins()
            .flat_map(|skin| skin.joints())
            .map(|joint| (joint.index(), node_name(&joint)))
            .collect();
        let armatures: HashSet<usize> = joint_names
            .keys()
            .filter_map(|&joint| parents[joint])
            .filter(|parent| !joint_names.contains_key(parent))
            .collect();

        let roots: Vec<gltf::Node> = match self
            .document
            .default_scene()
            .or_else(|| self.document.scenes().next())
        {
            Some(scene) => scene.nodes().collect(),
            None => self
                .document
                .nodes()
                .filter(|node| parents[node.index()].is_none())
                .collect(),
        };

        let mut material_users = vec![0u32; self.document.materials().count()];
        let mut objects = Vec::new();

        // Depth-first in document order
        let mut stack: Vec<(gltf::Node, Mat4)> = roots
            .into_iter()
            .rev()
            .map(|node| (node, Mat4::IDENTITY))
            .collect();
        while let Some((node, parent_world)) = stack.pop() {
            let world = parent_world * Mat4::from_cols_array_2d(&node.transform().matrix());
            let children: Vec<gltf::Node> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, world)));

            let name = node_name(&node);
            if let Some(mesh) = node.mesh() {
                let skin = node.skin();
                let data = self.read_mesh(&name, &mesh, skin.as_ref(), &mut material_users)?;
                let parent_bone = match skin {
                    Some(_) => None,
                    None => parents[node.index()].and_then(|p| joint_names.get(&p).cloned()),
                };
                objects.push(SceneObject {
                    name,
                    kind: ObjectKind::Mesh(data),
                    // Skinned vertices are already in bind space
                    world_transform: if skin.is_some() { Mat4::IDENTITY } else { world },
                    exportable: true,
                    parent_bone,
                    armature_bound: skin.is_some(),
                });
            } else if !joint_names.contains_key(&node.index()) {
                let kind = if armatures.contains(&node.index()) {
                    ObjectKind::Armature
                } else {
                    ObjectKind::Other
                };
                objects.push(SceneObject {
                    name,
                    kind,
                    world_transform: world,
                    exportable: true,
                    parent_bone: None,
                    armature_bound: false,
                });
            }
        }

        let materials = self
            .document
            .materials()
            .zip(&material_users)
            .map(|(material, &users)| self.material(&material, users, &images))
            .collect();

        let scene = Scene {
            name: self.scene_name(),
            objects,
            materials,
            skeletons: self.document.skins().map(|skin| self.skeleton(&skin)).collect(),
            actions: self.actions(),
            frame_rate: self.frame_rate,
        };

        info!(
            "Read {:?}: {} objects, {} materials, {} skeletons, {} actions",
            self.path,
            scene.objects.len(),
            scene.materials.len(),
            scene.skeletons.len(),
            scene.actions.len()
        );
        Ok(scene)
    }

    /// Pose evaluator for the file's only skin
    pub fn pose_evaluator(&self) -> Result<GltfPoseEvaluator> {
        let skins: Vec<gltf::Skin> = self.document.skins().collect();
        match skins.as_slice() {
            [skin] => GltfPoseEvaluator::new(&self.document, &self.buffers, skin, self.frame_rate),
            others => Err(ExportError::SkeletonCount(others.len()).into()),
        }
    }

    fn decode_images(&self) -> DecodedImages {
        self.document
            .images()
            .zip(&self.images)
            .map(|(image, data)| {
                let decoded = to_dynamic_image(data);
                if decoded.is_none() {
                    warn!(
                        "Image '{}' has unsupported pixel format {:?}",
                        image_name(&image),
                        data.format
                    );
                }
                decoded.map(Arc::new)
            })
            .collect()
    }

    fn read_mesh(
        &self,
        object: &str,
        mesh: &gltf::Mesh,
        skin: Option<&gltf::Skin>,
        material_users: &mut [u32],
    ) -> Result<MeshData> {
        let mut data = MeshData::default();
        let mut uvs: Vec<Option<[f32; 2]>> = Vec::new();
        let mut any_uvs = false;

        if let Some(skin) = skin {
            data.vertex_groups = skin.joints().map(|joint| node_name(&joint)).collect();
        }

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Object '{}': skipping primitive {} with mode {:?}",
                    object,
                    primitive.index(),
                    primitive.mode()
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&self.buffers[buffer.index()]));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .with_context(|| {
                    format!("Object '{}' primitive {} has no positions", object, primitive.index())
                })?
                .collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if indices.len() % 3 != 0 {
                return Err(ExportError::MalformedMesh {
                    object: object.to_string(),
                    reason: format!(
                        "primitive {} has {} indices, not a multiple of 3",
                        primitive.index(),
                        indices.len()
                    ),
                }
                .into());
            }
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
            let tex_coords: Option<Vec<[f32; 2]>> =
                reader.read_tex_coords(0).map(|t| t.into_f32().collect());
            any_uvs |= tex_coords.is_some();

            let slot = u16::try_from(data.material_slots.len())
                .with_context(|| format!("Object '{}' has too many primitives", object))?;
            let material = primitive.material().index();
            if let Some(users) = material.and_then(|m| material_users.get_mut(m)) {
                *users += 1;
            }
            data.material_slots.push(material);

            let base = data.positions.len() as u32;
            for tri in indices.chunks_exact(3) {
                data.triangles.push([base + tri[0], base + tri[1], base + tri[2]]);
                data.triangle_slots.push(slot);
                for &vertex in tri {
                    let vertex = vertex as usize;
                    let normal = normals.as_ref().and_then(|n| n.get(vertex));
                    data.corner_normals.push(normal.copied().unwrap_or([0.0; 3]));
                    let uv = tex_coords.as_ref().and_then(|t| t.get(vertex));
                    uvs.push(uv.map(|&[u, v]| [u, 1.0 - v]));
                }
            }

            if skin.is_some() {
                let mut weights: Vec<Vec<(u32, f32)>> = vec![Vec::new(); positions.len()];
                for set in 0..WEIGHT_SETS {
                    let (Some(joints), Some(set_weights)) =
                        (reader.read_joints(set), reader.read_weights(set))
                    else {
                        continue;
                    };
                    for (list, (joints, set_weights)) in weights
                        .iter_mut()
                        .zip(joints.into_u16().zip(set_weights.into_f32()))
                    {
                        for (&joint, &weight) in joints.iter().zip(&set_weights) {
                            if weight > 0.0 {
                                list.push((joint as u32, weight));
                            }
                        }
                    }
                }
                data.vertex_weights.extend(weights);
            }

            data.positions.extend(positions);
        }

        if any_uvs {
            data.corner_uvs = Some(uvs.into_iter().map(|uv| uv.unwrap_or(MISSING_UV)).collect());
        }
        Ok(data)
    }

    fn texture_link(
        &self,
        texture: gltf::Texture,
        images: &DecodedImages,
        channel: Option<(usize, &str)>,
    ) -> InputLink {
        let image = texture.source();
        let name = image_name(&image);
        let Some(decoded) = images.get(image.index()).cloned().flatten() else {
            return InputLink::Unsupported {
                node_kind: format!("image '{}'", name),
            };
        };
        match channel {
            None => InputLink::Image(ImageRef {
                name,
                image: decoded,
            }),
            Some((index, suffix)) => InputLink::Image(ImageRef {
                name: format!("{}_{}", name, suffix),
                image: Arc::new(extract_channel(&decoded, index)),
            }),
        }
    }

    fn material(&self, material: &gltf::Material, users: u32, images: &DecodedImages) -> Material {
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or(0)));
        let pbr = material.pbr_metallic_roughness();

        let base_color = pbr
            .base_color_texture()
            .map(|info| self.texture_link(info.texture(), images, None))
            .unwrap_or_default();
        // Metallic lives in the blue channel, roughness in green
        let metallic_roughness = pbr.metallic_roughness_texture();
        let metallic = metallic_roughness
            .as_ref()
            .map(|info| self.texture_link(info.texture(), images, Some((2, "metallic"))))
            .unwrap_or_default();
        let roughness = metallic_roughness
            .as_ref()
            .map(|info| self.texture_link(info.texture(), images, Some((1, "roughness"))))
            .unwrap_or_default();
        let normal = material
            .normal_texture()
            .map(|info| {
                InputLink::NormalMap(Box::new(self.texture_link(info.texture(), images, None)))
            })
            .unwrap_or_default();

        Material {
            name,
            users,
            surface: SurfaceOutput::Principled(PrincipledInputs {
                base_color: Socket::linked(pbr.base_color_factor(), base_color),
                metallic: Socket::linked(pbr.metallic_factor(), metallic),
                roughness: Socket::linked(pbr.roughness_factor(), roughness),
                normal,
            }),
        }
    }

    fn skeleton(&self, skin: &gltf::Skin) -> Skeleton {
        let inverse_binds: Vec<Mat4> = skin
            .reader(|buffer| Some(&self.buffers[buffer.index()]))
            .read_inverse_bind_matrices()
            .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_default();

        Skeleton {
            name: skin
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("skin_{}", skin.index())),
            bones: skin
                .joints()
                .enumerate()
                .map(|(i, joint)| Bone {
                    name: node_name(&joint),
                    inverse_bind: inverse_binds.get(i).copied().unwrap_or(Mat4::IDENTITY),
                })
                .collect(),
        }
    }

    /// One action per animation, spanning frames `0..=ceil(duration * fps)`
    fn actions(&self) -> Vec<Action> {
        self.document
            .animations()
            .map(|animation| {
                let mut duration = 0.0f32;
                for channel in animation.channels() {
                    let reader = channel.reader(|buffer| Some(&self.buffers[buffer.index()]));
                    if let Some(times) = reader.read_inputs() {
                        duration = times.fold(duration, f32::max);
                    }
                }
                Action {
                    name: animation_name(&animation),
                    frame_start: 0,
                    frame_end: (duration * self.frame_rate).ceil() as i32,
                }
            })
            .collect()
    }
}
