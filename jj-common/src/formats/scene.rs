//! jj scene binary format (.jj), version 3
//!
//! Consolidated triangle-soup scene: world-space geometry, material records,
//! texture name table and optional skin bindings. All values little-endian.
//!
//! # Layout
//! ```text
//! 0x00: version u32 (= 3)
//! 0x04: triangle_count u32
//! 0x08: material_count u32
//! 0x0C: texture_count u32
//! 0x10: has_skin_data u8 (0 or 1)
//! 0x11: padding (3 bytes)
//! 0x14: positions       (triangle_count * 3 * 12 bytes, f32x3)
//! var:  shade           (triangle_count * 3 * 20 bytes, normal f32x3 + uv f32x2)
//! var:  material_ids    (triangle_count * 2 bytes, u16)
//! var:  materials       (material_count * 16 bytes)
//! var:  texture_names   (texture_count * 512 bytes, UTF-16LE, null padded)
//! var:  bone_indices    (triangle_count * 3 * 16 bytes, u32x4), if has_skin_data
//! var:  bone_weights    (triangle_count * 3 * 16 bytes, f32x4), if has_skin_data
//! ```

use super::material::MATERIAL_RECORD_SIZE;
use super::texture_table::TEXTURE_NAME_SIZE;

/// Scene format version written by this crate
pub const SCENE_VERSION: u32 = 3;

/// Bytes per corner position (f32 × 3)
pub const POSITION_SIZE: usize = 12;
/// Bytes per corner shade vector (normal f32 × 3 + uv f32 × 2)
pub const SHADE_SIZE: usize = 20;
/// Bytes per triangle material id (u16)
pub const MATERIAL_ID_SIZE: usize = 2;
/// Bytes per corner bone-index set (u32 × 4)
pub const SKIN_INDICES_SIZE: usize = 16;
/// Bytes per corner bone-weight set (f32 × 4)
pub const SKIN_WEIGHTS_SIZE: usize = 16;

/// Scene file header (20 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SceneHeader {
    pub version: u32,
    pub triangle_count: u32,
    pub material_count: u32,
    pub texture_count: u32,
    pub has_skin_data: bool,
    pub _padding: [u8; 3],
}

impl SceneHeader {
    pub const SIZE: usize = 20;

    pub fn new(
        triangle_count: u32,
        material_count: u32,
        texture_count: u32,
        has_skin_data: bool,
    ) -> Self {
        Self {
            version: SCENE_VERSION,
            triangle_count,
            material_count,
            texture_count,
            has_skin_data,
            _padding: [0; 3],
        }
    }

    /// Number of triangle corners (vertex records) in the file
    pub fn corner_count(&self) -> usize {
        self.triangle_count as usize * 3
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.triangle_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.material_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.texture_count.to_le_bytes());
        bytes[16] = self.has_skin_data as u8;
        // padding bytes stay 0
        bytes
    }

    /// Read header from bytes
    ///
    /// Returns `None` for short input or a version other than [`SCENE_VERSION`];
    /// each version is a frozen layout.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version != SCENE_VERSION {
            return None;
        }
        Some(Self {
            version,
            triangle_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            material_count: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            texture_count: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            has_skin_data: bytes[16] != 0,
            _padding: [0; 3],
        })
    }

    /// Byte offset of the first material id
    pub fn material_ids_offset(&self) -> usize {
        Self::SIZE + self.corner_count() * (POSITION_SIZE + SHADE_SIZE)
    }

    /// Byte offset of the first material record
    pub fn materials_offset(&self) -> usize {
        self.material_ids_offset() + self.triangle_count as usize * MATERIAL_ID_SIZE
    }

    /// Byte offset of the first texture name
    pub fn texture_names_offset(&self) -> usize {
        self.materials_offset() + self.material_count as usize * MATERIAL_RECORD_SIZE
    }

    /// Byte offset of the skin block (end of file when there is none)
    pub fn skin_offset(&self) -> usize {
        self.texture_names_offset() + self.texture_count as usize * TEXTURE_NAME_SIZE
    }

    /// Calculate total file size (header + all blocks)
    pub fn file_size(&self) -> usize {
        let skin = if self.has_skin_data {
            self.corner_count() * (SKIN_INDICES_SIZE + SKIN_WEIGHTS_SIZE)
        } else {
            0
        };
        self.skin_offset() + skin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_header_layout() {
        let header = SceneHeader::new(2, 1, 3, true);
        let bytes = header.to_bytes();

        assert_eq!(bytes.len(), SceneHeader::SIZE);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &[1, 0, 0, 0]);

        assert_eq!(SceneHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_scene_header_rejects_other_versions() {
        let mut bytes = SceneHeader::new(0, 0, 0, false).to_bytes();
        bytes[0] = 2;
        assert!(SceneHeader::from_bytes(&bytes).is_none());
        assert!(SceneHeader::from_bytes(&bytes[..10]).is_none());
    }

    #[test]
    fn test_scene_file_size() {
        let header = SceneHeader::new(1, 1, 1, false);
        // 20 + 3*12 + 3*20 + 2 + 16 + 512
        assert_eq!(header.file_size(), 646);

        let skinned = SceneHeader::new(1, 1, 1, true);
        assert_eq!(skinned.file_size(), 646 + 3 * 32);

        assert_eq!(SceneHeader::new(0, 0, 0, false).file_size(), SceneHeader::SIZE);
    }
}
