//! jj animation binary format (.janim)
//!
//! Sampled skinning matrices for one action. POD format - no magic bytes.
//!
//! # Layout
//! ```text
//! 0x00: frame_count u32
//! 0x04: bone_count u32
//! 0x08: forward matrices   (frame_count × bone_count × 64 bytes)
//! var:  adjugate matrices  (frame_count × bone_count × 64 bytes)
//! ```
//!
//! Matrices are 16 f32 in row-major order, stored frame-major:
//! `[frame0_bone0, frame0_bone1, ..., frame1_bone0, ...]`. Both blocks are
//! already combined with each bone's inverse bind matrix.

use glam::Mat4;

/// Size of one 4×4 f32 matrix in bytes
pub const MATRIX_SIZE: usize = 64;

/// Animation file header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct AnimationHeader {
    /// Number of sampled frames
    pub frame_count: u32,
    /// Number of bones per frame
    pub bone_count: u32,
}

impl AnimationHeader {
    pub const SIZE: usize = 8;

    pub fn new(frame_count: u32, bone_count: u32) -> Self {
        Self {
            frame_count,
            bone_count,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.bone_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            frame_count: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            bone_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Number of matrices in each of the two blocks
    pub fn matrix_count(&self) -> usize {
        self.frame_count as usize * self.bone_count as usize
    }

    /// Calculate expected data size (excluding header)
    pub fn data_size(&self) -> usize {
        2 * self.matrix_count() * MATRIX_SIZE
    }

    /// Calculate total file size (header + data)
    pub fn file_size(&self) -> usize {
        Self::SIZE + self.data_size()
    }
}

/// Row-major element order of a matrix (glam stores columns)
pub fn matrix_to_row_major(matrix: &Mat4) -> [f32; 16] {
    matrix.transpose().to_cols_array()
}

/// Inverse of [`matrix_to_row_major`]
pub fn matrix_from_row_major(rows: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(rows).transpose()
}
