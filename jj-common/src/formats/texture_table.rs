//! Texture name table entries
//!
//! Each entry is a fixed 512-byte field holding a UTF-16LE path followed by
//! null code units. At most 511 code units fit, so every entry is terminated.

use super::FormatError;

/// Size of one texture name field in bytes
pub const TEXTURE_NAME_SIZE: usize = 512;

/// Maximum number of UTF-16 code units in a texture name
pub const TEXTURE_NAME_MAX_UNITS: usize = TEXTURE_NAME_SIZE / 2 - 1;

/// Encode a texture path into its fixed-width table field
pub fn encode_texture_name(path: &str) -> Result<[u8; TEXTURE_NAME_SIZE], FormatError> {
    let units: Vec<u16> = path.encode_utf16().collect();
    if units.len() > TEXTURE_NAME_MAX_UNITS {
        return Err(FormatError::TexturePathTooLong {
            path: path.to_string(),
            units: units.len(),
            max: TEXTURE_NAME_MAX_UNITS,
        });
    }

    let mut field = [0u8; TEXTURE_NAME_SIZE];
    for (i, unit) in units.iter().enumerate() {
        field[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    Ok(field)
}

/// Decode a texture name field, stopping at the first null code unit
pub fn decode_texture_name(field: &[u8]) -> Option<String> {
    if field.len() < TEXTURE_NAME_SIZE {
        return None;
    }
    let units: Vec<u16> = field[..TEXTURE_NAME_SIZE]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_name_field() {
        let field = encode_texture_name("textures/rock_base_color.dds").unwrap();
        assert_eq!(&field[0..4], &[b't', 0, b'e', 0]);
        assert!(field[56..].iter().all(|&b| b == 0));
        assert_eq!(
            decode_texture_name(&field).as_deref(),
            Some("textures/rock_base_color.dds")
        );
    }

    #[test]
    fn test_texture_name_non_ascii() {
        let field = encode_texture_name("textures/grün.dds").unwrap();
        assert_eq!(decode_texture_name(&field).as_deref(), Some("textures/grün.dds"));
    }

    #[test]
    fn test_texture_name_limit() {
        let longest = "a".repeat(TEXTURE_NAME_MAX_UNITS);
        let field = encode_texture_name(&longest).unwrap();
        assert_eq!(&field[TEXTURE_NAME_SIZE - 2..], &[0, 0]);

        let too_long = "a".repeat(TEXTURE_NAME_MAX_UNITS + 1);
        assert!(matches!(
            encode_texture_name(&too_long),
            Err(FormatError::TexturePathTooLong { units: 512, max: 511, .. })
        ));
    }
}
