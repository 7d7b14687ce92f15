//! Material record (16 bytes)
//!
//! # Layout
//! ```text
//! 0x00: base_color u32 - texture index, or tagged 10/11/10 color
//! 0x04: metallic   u32 - texture index, or bits of the negated f32 value
//! 0x08: roughness  u32 - texture index, or bits of the negated f32 value
//! 0x0C: normal     u32 - texture index, or GEOMETRIC_NORMAL
//! ```
//!
//! Bit 31 clear means "texture index in bits 0..=30"; bit 31 set means
//! "constant". See [`crate::packing`].

use glam::Vec3;

use super::FormatError;
use crate::packing::{
    decode_scalar, encode_scalar, is_constant, pack_color_10_11_10, unpack_color_10_11_10,
    CONSTANT_TAG, GEOMETRIC_NORMAL, PAYLOAD_MASK,
};

/// Size of one material record in bytes
pub const MATERIAL_RECORD_SIZE: usize = 16;

/// Encoded material record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct MaterialRecord {
    pub base_color: u32,
    pub metallic: u32,
    pub roughness: u32,
    pub normal: u32,
}

/// Decoded view of a single material field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialField {
    /// Index into the texture name table
    Texture(u32),
    /// Quantized base color
    Color([f32; 3]),
    /// Metallic or roughness constant
    Scalar(f32),
    /// No normal map
    GeometricNormal,
}

/// Encode a texture index, rejecting indices that would collide with the tag bit
pub fn encode_texture_index(index: u32) -> Result<u32, FormatError> {
    if index & CONSTANT_TAG != 0 {
        return Err(FormatError::TextureIndexOverflow(index));
    }
    Ok(index)
}

impl MaterialRecord {
    /// Default record: mid-grey dielectric, shaded with the geometric normal
    pub fn new() -> Self {
        Self {
            base_color: pack_color_10_11_10(Vec3::splat(0.8)),
            metallic: encode_scalar(0.0),
            roughness: encode_scalar(0.5),
            normal: GEOMETRIC_NORMAL,
        }
    }

    /// Encoded constant base color
    pub fn color_word(color: Vec3) -> u32 {
        pack_color_10_11_10(color)
    }

    /// Encoded metallic/roughness constant
    pub fn scalar_word(value: f32) -> u32 {
        encode_scalar(value)
    }

    pub fn base_color_field(&self) -> MaterialField {
        if is_constant(self.base_color) {
            MaterialField::Color(unpack_color_10_11_10(self.base_color).to_array())
        } else {
            MaterialField::Texture(self.base_color & PAYLOAD_MASK)
        }
    }

    pub fn metallic_field(&self) -> MaterialField {
        scalar_field(self.metallic)
    }

    pub fn roughness_field(&self) -> MaterialField {
        scalar_field(self.roughness)
    }

    pub fn normal_field(&self) -> MaterialField {
        if is_constant(self.normal) {
            MaterialField::GeometricNormal
        } else {
            MaterialField::Texture(self.normal & PAYLOAD_MASK)
        }
    }

    /// Every texture index referenced by this record
    pub fn texture_indices(&self) -> impl Iterator<Item = u32> {
        [self.base_color, self.metallic, self.roughness, self.normal]
            .into_iter()
            .filter(|word| !is_constant(*word))
    }

    /// Write record to bytes
    pub fn to_bytes(&self) -> [u8; MATERIAL_RECORD_SIZE] {
        let mut bytes = [0u8; MATERIAL_RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.base_color.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.metallic.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.roughness.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.normal.to_le_bytes());
        bytes
    }

    /// Read record from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MATERIAL_RECORD_SIZE {
            return None;
        }
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
        };
        Some(Self {
            base_color: word(0),
            metallic: word(4),
            roughness: word(8),
            normal: word(12),
        })
    }
}

impl Default for MaterialRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn scalar_field(word: u32) -> MaterialField {
    if is_constant(word) {
        MaterialField::Scalar(decode_scalar(word))
    } else {
        MaterialField::Texture(word & PAYLOAD_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_fields() {
        let record = MaterialRecord::default();
        assert_eq!(record.metallic_field(), MaterialField::Scalar(0.0));
        assert_eq!(record.roughness_field(), MaterialField::Scalar(0.5));
        assert_eq!(record.normal_field(), MaterialField::GeometricNormal);
        assert_eq!(record.texture_indices().count(), 0);
    }

    #[test]
    fn test_texture_fields_have_clear_tag() {
        let record = MaterialRecord {
            base_color: encode_texture_index(3).unwrap(),
            metallic: encode_texture_index(0).unwrap(),
            roughness: MaterialRecord::scalar_word(0.25),
            normal: encode_texture_index(5).unwrap(),
        };

        assert_eq!(record.base_color >> 31, 0);
        assert_eq!(record.base_color_field(), MaterialField::Texture(3));
        assert_eq!(record.metallic_field(), MaterialField::Texture(0));
        assert_eq!(record.roughness_field(), MaterialField::Scalar(0.25));
        assert_eq!(record.normal_field(), MaterialField::Texture(5));
        assert_eq!(record.texture_indices().collect::<Vec<_>>(), vec![3, 0, 5]);
    }

    #[test]
    fn test_constant_color_has_set_tag() {
        let word = MaterialRecord::color_word(Vec3::new(0.8, 0.8, 0.8));
        assert_eq!(word >> 31, 1);

        let record = MaterialRecord {
            base_color: word,
            ..MaterialRecord::default()
        };
        let MaterialField::Color(rgb) = record.base_color_field() else {
            panic!("expected a constant color");
        };
        for channel in rgb {
            assert!((channel - 0.8).abs() <= 1.0 / 1023.0);
        }
    }

    #[test]
    fn test_texture_index_overflow() {
        assert!(encode_texture_index(0x7FFF_FFFF).is_ok());
        assert!(matches!(
            encode_texture_index(0x8000_0000),
            Err(FormatError::TextureIndexOverflow(_))
        ));
    }

    #[test]
    fn test_record_bytes() {
        let record = MaterialRecord {
            base_color: 1,
            metallic: 2,
            roughness: 3,
            normal: GEOMETRIC_NORMAL,
        };
        let bytes = record.to_bytes();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0xFF; 4]);
        assert_eq!(MaterialRecord::from_bytes(&bytes), Some(record));
        assert!(MaterialRecord::from_bytes(&bytes[..8]).is_none());
    }
}
