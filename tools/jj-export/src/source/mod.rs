//! Scene sources: build the authoring-tool scene model from files

pub mod gltf;
pub mod pose;

pub use self::gltf::GltfSource;
pub use self::pose::GltfPoseEvaluator;

/// Frame rate assumed for time-based sources without one
pub const DEFAULT_SOURCE_FPS: f32 = 24.0;

/// Action name of a glTF animation
pub(crate) fn animation_name(animation: &::gltf::Animation) -> String {
    animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("action_{}", animation.index()))
}
