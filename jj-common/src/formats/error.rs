//! Errors raised while encoding format blocks

/// Error type for format encoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Texture path '{path}' is {units} UTF-16 code units, maximum is {max}")]
    TexturePathTooLong {
        path: String,
        units: usize,
        max: usize,
    },

    #[error("Texture index {0} does not fit below the constant tag bit")]
    TextureIndexOverflow(u32),

    #[error("{block} block has {actual} entries, header declares {expected}")]
    LengthMismatch {
        block: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Header declares skin data, but the file was closed without it")]
    MissingSkinData,

    #[error("Header declares no skin data, but skin data was written")]
    UnexpectedSkinData,
}
