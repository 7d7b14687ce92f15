//! jj-export library
//!
//! Consolidates authored scenes into the jj scene and animation files:
//! world-space triangle soup with packed materials, optional four-bone skin
//! data, and pre-multiplied per-frame bone matrices.

pub mod animation;
pub mod error;
pub mod export;
pub mod formats;
pub mod manifest;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod skin;
pub mod source;
pub mod texture;
pub mod transform;

// Re-export format constants from jj-common
pub use jj_common::{FileFormat, JJ_FORMAT};

pub use error::ExportError;

// Re-export the export session entry points
pub use animation::{export_animations, sample_action, AnimationOptions, SampledAnimation};
pub use export::{export_scene, write_scene_file, ExportOptions, ExportedScene, SkinningMode};

// Re-export scene model and sources
pub use scene::{PoseEvaluator, Scene};
pub use source::{GltfPoseEvaluator, GltfSource};
