//! Material value packing utilities
//!
//! Every material field is stored as one 32-bit word. Bit 31 is the tag:
//! - set: the word holds a constant (packed color, negated scalar or the
//!   geometric-normal sentinel)
//! - clear: bits 0..=30 hold an index into the scene's texture table
//!
//! Used by both `jj-export` (asset pipeline) and file readers.

use glam::Vec3;

// ============================================================================
// Tag Constants
// ============================================================================

/// Tag bit marking a constant value
pub const CONSTANT_TAG: u32 = 0x8000_0000;

/// Mask selecting the payload bits below the tag
pub const PAYLOAD_MASK: u32 = !CONSTANT_TAG;

/// Normal field sentinel: no normal map, shade with the geometric normal
pub const GEOMETRIC_NORMAL: u32 = u32::MAX;

/// Bit widths of the packed base color channels
pub const RED_BITS: u32 = 10;
pub const GREEN_BITS: u32 = 11;
pub const BLUE_BITS: u32 = 10;

const GREEN_SHIFT: u32 = RED_BITS;
const BLUE_SHIFT: u32 = RED_BITS + GREEN_BITS;

/// Returns true when the word carries a constant rather than a texture index
#[inline]
pub const fn is_constant(word: u32) -> bool {
    word & CONSTANT_TAG != 0
}

// ============================================================================
// Basic Conversion Functions
// ============================================================================

/// Convert f32 to an unsigned normalized integer with `bits` bits
///
/// Maps [0.0, 1.0] to [0, 2^bits - 1] with rounding. NaN maps to 0.
#[inline]
pub fn f32_to_unorm(value: f32, bits: u32) -> u32 {
    let max = ((1u32 << bits) - 1) as f32;
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    (clamped * max).round() as u32
}

/// Convert an unsigned normalized integer with `bits` bits back to f32
#[inline]
pub fn unorm_to_f32(value: u32, bits: u32) -> f32 {
    let max = (1u32 << bits) - 1;
    (value & max) as f32 / max as f32
}

// ============================================================================
// Color Packing
// ============================================================================

/// Pack an RGB color into a tagged 10/11/10 word
///
/// Layout: `[tag:1][b:10][g:11][r:10]` (red in the low bits).
#[inline]
pub fn pack_color_10_11_10(color: Vec3) -> u32 {
    let r = f32_to_unorm(color.x, RED_BITS);
    let g = f32_to_unorm(color.y, GREEN_BITS);
    let b = f32_to_unorm(color.z, BLUE_BITS);
    CONSTANT_TAG | r | (g << GREEN_SHIFT) | (b << BLUE_SHIFT)
}

/// Unpack a 10/11/10 word to an RGB color (the tag bit is ignored)
#[inline]
pub fn unpack_color_10_11_10(word: u32) -> Vec3 {
    Vec3::new(
        unorm_to_f32(word, RED_BITS),
        unorm_to_f32(word >> GREEN_SHIFT, GREEN_BITS),
        unorm_to_f32(word >> BLUE_SHIFT, BLUE_BITS),
    )
}

// ============================================================================
// Scalar Packing
// ============================================================================

/// Encode a metallic/roughness constant as the bits of its negated value
///
/// The value is clamped to [0, 1] first, so the stored float is always
/// `<= 0.0` and its sign bit doubles as the constant tag (`0.0` becomes `-0.0`).
#[inline]
pub fn encode_scalar(value: f32) -> u32 {
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    (-clamped).to_bits()
}

/// Decode a scalar constant written by [`encode_scalar`]
#[inline]
pub fn decode_scalar(word: u32) -> f32 {
    -f32::from_bits(word)
}
