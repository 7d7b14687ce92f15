//! Pose evaluation for glTF animations
//!
//! Channels are read once up front; evaluation interpolates them at
//! `(frame + subframe) / fps` seconds and composes node transforms from the
//! scene root, which serves as armature space.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use tracing::debug;

use super::animation_name;
use crate::error::ExportError;
use crate::scene::{FrameTime, PoseEvaluator};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trs {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Trs {
    fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
struct NodeRest {
    parent: Option<usize>,
    rest: Trs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone)]
enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

#[derive(Debug, Clone)]
struct Channel {
    node: usize,
    interpolation: Interpolation,
    times: Vec<f32>,
    values: ChannelValues,
}

#[derive(Debug, Clone)]
struct Clip {
    name: String,
    channels: Vec<Channel>,
}

/// Keyframe pair around `t` and the blend factor between them
fn keyframe(times: &[f32], t: f32) -> (usize, usize, f32) {
    let last = times.len().saturating_sub(1);
    let next = times.partition_point(|&key| key <= t);
    if next == 0 {
        return (0, 0, 0.0);
    }
    if next > last {
        return (last, last, 0.0);
    }
    let i = next - 1;
    let (t0, t1) = (times[i], times[next]);
    let factor = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
    (i, next, factor.clamp(0.0, 1.0))
}

fn sample_vec3(
    times: &[f32],
    values: &[Vec3],
    t: f32,
    interpolation: Interpolation,
) -> Option<Vec3> {
    if times.is_empty() || values.len() < times.len() {
        return None;
    }
    let (i, j, factor) = keyframe(times, t);
    Some(match interpolation {
        Interpolation::Step => values[i],
        Interpolation::Linear => values[i].lerp(values[j], factor),
    })
}

fn sample_quat(
    times: &[f32],
    values: &[Quat],
    t: f32,
    interpolation: Interpolation,
) -> Option<Quat> {
    if times.is_empty() || values.len() < times.len() {
        return None;
    }
    let (i, j, factor) = keyframe(times, t);
    Some(match interpolation {
        Interpolation::Step => values[i],
        Interpolation::Linear => values[i].slerp(values[j], factor).normalize(),
    })
}

/// Cubic-spline outputs store (in-tangent, value, out-tangent) per key; keep
/// the values and interpolate them linearly
fn key_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|key| key[1]).collect()
    } else {
        values
    }
}

/// Evaluates one skin's joints under a selected animation
#[derive(Debug, Clone)]
pub struct GltfPoseEvaluator {
    frame_rate: f32,
    nodes: Vec<NodeRest>,
    joints: Vec<usize>,
    clips: Vec<Clip>,
    active: Option<usize>,
    current: FrameTime,
}

impl GltfPoseEvaluator {
    /// Read the node hierarchy and every animation of a document
    pub fn new(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        skin: &gltf::Skin,
        frame_rate: f32,
    ) -> Result<Self> {
        let mut nodes: Vec<NodeRest> = document
            .nodes()
            .map(|node| {
                let (translation, rotation, scale) = node.transform().decomposed();
                NodeRest {
                    parent: None,
                    rest: Trs {
                        translation: Vec3::from(translation),
                        rotation: Quat::from_array(rotation),
                        scale: Vec3::from(scale),
                    },
                }
            })
            .collect();
        for node in document.nodes() {
            for child in node.children() {
                nodes[child.index()].parent = Some(node.index());
            }
        }

        let mut clips = Vec::new();
        for animation in document.animations() {
            let mut channels = Vec::new();
            for channel in animation.channels() {
                let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
                let times: Vec<f32> = reader
                    .read_inputs()
                    .context("Animation channel has no input times")?
                    .collect();
                let (interpolation, cubic) = match channel.sampler().interpolation() {
                    gltf::animation::Interpolation::Step => (Interpolation::Step, false),
                    gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
                    gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
                };
                let values = match reader
                    .read_outputs()
                    .context("Animation channel has no output values")?
                {
                    ReadOutputs::Translations(values) => ChannelValues::Translation(key_values(
                        values.map(Vec3::from).collect(),
                        cubic,
                    )),
                    ReadOutputs::Rotations(values) => ChannelValues::Rotation(key_values(
                        values.into_f32().map(Quat::from_array).collect(),
                        cubic,
                    )),
                    ReadOutputs::Scales(values) => {
                        ChannelValues::Scale(key_values(values.map(Vec3::from).collect(), cubic))
                    }
                    ReadOutputs::MorphTargetWeights(_) => continue,
                };
                channels.push(Channel {
                    node: channel.target().node().index(),
                    interpolation,
                    times,
                    values,
                });
            }
            debug!(
                "Animation '{}': {} channels",
                animation_name(&animation),
                channels.len()
            );
            clips.push(Clip {
                name: animation_name(&animation),
                channels,
            });
        }

        Ok(Self {
            frame_rate,
            nodes,
            joints: skin.joints().map(|joint| joint.index()).collect(),
            clips,
            active: None,
            current: FrameTime::default(),
        })
    }

    fn seconds(&self) -> f32 {
        if self.frame_rate > 0.0 {
            (self.current.as_fractional() / self.frame_rate as f64) as f32
        } else {
            0.0
        }
    }

    /// Local transform of every node at the current time
    fn local_transforms(&self) -> Vec<Trs> {
        let mut locals: Vec<Trs> = self.nodes.iter().map(|node| node.rest).collect();
        let Some(clip) = self.active.map(|i| &self.clips[i]) else {
            return locals;
        };

        let t = self.seconds();
        for channel in &clip.channels {
            let Some(local) = locals.get_mut(channel.node) else {
                continue;
            };
            let times = &channel.times;
            match &channel.values {
                ChannelValues::Translation(values) => {
                    if let Some(v) = sample_vec3(times, values, t, channel.interpolation) {
                        local.translation = v;
                    }
                }
                ChannelValues::Rotation(values) => {
                    if let Some(q) = sample_quat(times, values, t, channel.interpolation) {
                        local.rotation = q;
                    }
                }
                ChannelValues::Scale(values) => {
                    if let Some(v) = sample_vec3(times, values, t, channel.interpolation) {
                        local.scale = v;
                    }
                }
            }
        }
        locals
    }

    fn world_matrix(&self, node: usize, locals: &[Trs], cache: &mut [Option<Mat4>]) -> Mat4 {
        if let Some(matrix) = cache[node] {
            return matrix;
        }
        let local = locals[node].matrix();
        let world = match self.nodes[node].parent {
            Some(parent) => self.world_matrix(parent, locals, cache) * local,
            None => local,
        };
        cache[node] = Some(world);
        world
    }
}

impl PoseEvaluator for GltfPoseEvaluator {
    fn frame(&self) -> FrameTime {
        self.current
    }

    fn set_frame(&mut self, time: FrameTime) {
        self.current = time;
    }

    fn action(&self) -> Option<String> {
        self.active.map(|i| self.clips[i].name.clone())
    }

    fn set_action(&mut self, name: &str) -> Result<()> {
        let index = self
            .clips
            .iter()
            .position(|clip| clip.name == name)
            .ok_or_else(|| ExportError::UnknownAction(name.to_string()))?;
        self.active = Some(index);
        Ok(())
    }

    fn clear_action(&mut self) {
        self.active = None;
    }

    fn bone_to_armature(&self) -> Result<Vec<Mat4>> {
        let locals = self.local_transforms();
        let mut cache = vec![None; self.nodes.len()];
        Ok(self
            .joints
            .iter()
            .map(|&joint| self.world_matrix(joint, &locals, &mut cache))
            .collect())
    }
}
