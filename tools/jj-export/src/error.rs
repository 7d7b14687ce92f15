//! Fatal export errors

use jj_common::FormatError;
use std::path::PathBuf;

/// Error type for the export pipeline.
///
/// Data-quality problems are repaired and logged instead; everything here
/// aborts the export of the affected file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Scene has {0} skeletons; skeletal export needs exactly one")]
    SkeletonCount(usize),

    #[error("Mesh '{object}' is malformed: {reason}")]
    MalformedMesh { object: String, reason: String },

    #[error("Scene uses {0} materials, maximum is 65536")]
    TooManyMaterials(usize),

    #[error("Scene has {0} triangles, maximum is {max}", max = u32::MAX)]
    TooManyTriangles(usize),

    #[error("Frame rate must be in (0, {max}], got {0}", max = crate::animation::MAX_FRAME_RATE)]
    InvalidFrameRate(f32),

    #[error("Action '{0}' not found")]
    UnknownAction(String),

    #[error("Pose has {actual} bones, skeleton has {expected}")]
    BoneCountMismatch { expected: usize, actual: usize },

    #[error("Texture compressor failed on {path:?}: {reason}")]
    CompressorFailed { path: PathBuf, reason: String },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
