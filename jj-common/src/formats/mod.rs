//! jj binary asset formats
//!
//! These are POD (Plain Old Data) formats consumed directly by the renderer.
//! No magic bytes - the scene file starts with its version word and the
//! animation file is identified by its extension.
//!
//! All format headers implement the [`BinarySerializable`] trait for consistent
//! serialization/deserialization.

pub mod animation;
mod error;
pub mod material;
pub mod scene;
mod serialization;
pub mod texture_table;

pub use animation::*;
pub use error::FormatError;
pub use material::*;
pub use scene::*;
pub use serialization::BinarySerializable;
pub use texture_table::*;

/// File format constants for one version of the jj formats.
///
/// This is the single source of truth for extensions and the version word.
#[derive(Debug, Clone, Copy)]
pub struct FileFormat {
    /// Scene file extension without dot
    pub scene_ext: &'static str,
    /// Animation file extension without dot
    pub animation_ext: &'static str,
    /// Extension of the lossless intermediate images handed to the compressor
    pub raw_texture_ext: &'static str,
    /// Extension of the compressed textures named in the texture table
    pub texture_ext: &'static str,
    /// Scene format version
    pub version: u32,
}

/// Current jj format specification.
pub const JJ_FORMAT: FileFormat = FileFormat {
    scene_ext: "jj",
    animation_ext: "janim",
    raw_texture_ext: "png",
    texture_ext: "dds",
    version: SCENE_VERSION,
};
