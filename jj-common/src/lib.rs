//! Shared types and utilities for the jj asset formats
//!
//! This crate provides the format definitions shared between:
//! - `jj-export` (asset pipeline)
//! - renderers and inspection tools reading `.jj` / `.janim` files
//!
//! # Modules
//!
//! - [`packing`] - Material value quantization (f32 → 10/11/10 unorm, tagged words)
//! - [`formats`] - Binary layouts for the scene and animation files

pub mod formats;
pub mod packing;

// Re-export commonly used packing items
pub use packing::{
    decode_scalar, encode_scalar, f32_to_unorm, is_constant, pack_color_10_11_10,
    unorm_to_f32, unpack_color_10_11_10, CONSTANT_TAG, GEOMETRIC_NORMAL, PAYLOAD_MASK,
};

// Re-export commonly used format items
pub use formats::{
    decode_texture_name, encode_texture_index, encode_texture_name, matrix_from_row_major,
    matrix_to_row_major, AnimationHeader, BinarySerializable, FileFormat, FormatError,
    MaterialField, MaterialRecord, SceneHeader, JJ_FORMAT, MATERIAL_ID_SIZE, MATERIAL_RECORD_SIZE,
    MATRIX_SIZE, POSITION_SIZE, SCENE_VERSION, SHADE_SIZE, SKIN_INDICES_SIZE, SKIN_WEIGHTS_SIZE,
    TEXTURE_NAME_MAX_UNITS, TEXTURE_NAME_SIZE,
};
