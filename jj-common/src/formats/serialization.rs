//! Binary serialization trait for fixed-size format records.
//!
//! The file headers and the material record implement `BinarySerializable`
//! so generic readers (e.g. the exporter's `inspect` command) can parse any of
//! them. Each type keeps its own `to_bytes()` returning a fixed-size array.

/// Trait for binary-serializable fixed-size records.
///
/// The trait uses `Vec<u8>` for the return type because associated const
/// generics in return types (`[u8; Self::SIZE]`) are not yet stable in Rust.
///
/// # Example
///
/// ```
/// use jj_common::formats::{BinarySerializable, SceneHeader};
///
/// let header = SceneHeader::new(12, 2, 1, false);
///
/// // Using the trait (returns Vec<u8>)
/// let bytes = header.serialize();
/// let parsed = SceneHeader::deserialize(&bytes).unwrap();
/// assert_eq!(parsed.triangle_count, 12);
///
/// // Using the type-specific method (returns [u8; 20])
/// let bytes_array = header.to_bytes();
/// assert_eq!(bytes_array.len(), 20);
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized record in bytes.
    const SIZE: usize;

    /// Serialize to bytes.
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize from bytes.
    ///
    /// Returns `None` if the byte slice is too short or contains invalid data.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

impl BinarySerializable for super::SceneHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::AnimationHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::MaterialRecord {
    const SIZE: usize = super::MATERIAL_RECORD_SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}
