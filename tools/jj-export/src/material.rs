//! Material graph to fixed-size material records
//!
//! Each field of a [`MaterialRecord`] either carries a tagged constant or an
//! index into the scene's texture table. Textures are collected in a
//! [`TextureRegistry`] while encoding.

use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, warn};

use jj_common::{encode_texture_index, MaterialRecord, GEOMETRIC_NORMAL, JJ_FORMAT};

use crate::error::ExportError;
use crate::scene::{ImageRef, InputLink, Material, PrincipledInputs, SurfaceOutput};

/// Largest number of materials addressable by a 16-bit material id
pub const MAX_MATERIALS: usize = u16::MAX as usize + 1;

/// Material input a texture feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureChannel {
    BaseColor,
    Metallic,
    Roughness,
    Normal,
}

impl TextureChannel {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::BaseColor => "base_color",
            Self::Metallic => "metallic",
            Self::Roughness => "roughness",
            Self::Normal => "normal",
        }
    }

    pub fn profile(self) -> CompressionProfile {
        match self {
            Self::BaseColor => CompressionProfile::Color,
            Self::Metallic | Self::Roughness => CompressionProfile::Mono,
            Self::Normal => CompressionProfile::Normal,
        }
    }
}

/// Block compression family for a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionProfile {
    /// Four-channel color (BC7)
    Color,
    /// Single channel (BC4)
    Mono,
    /// Two-channel tangent-space normal (BC5)
    Normal,
}

/// Texture referenced by at least one material field
#[derive(Debug, Clone)]
pub struct TextureEntry {
    /// Sanitized `<material>_<channel>` name
    pub name: String,
    pub channel: TextureChannel,
    pub image: Arc<DynamicImage>,
    /// Path written into the scene's texture table
    pub table_path: String,
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `_`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Texture table under construction, one entry per (material, channel) use
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    texture_dir: String,
    entries: Vec<TextureEntry>,
    /// Keyed by scene material index
    by_use: HashMap<(usize, TextureChannel), u32>,
    names: HashSet<String>,
}

impl TextureRegistry {
    /// `texture_dir` is the table path prefix, relative to the scene file
    pub fn new(texture_dir: &str) -> Self {
        Self {
            texture_dir: texture_dir.trim_end_matches(['/', '\\']).to_string(),
            ..Default::default()
        }
    }

    /// Register the texture feeding `channel` of scene material `material`
    /// and return its table index
    ///
    /// Materials whose names sanitize to the same string get numbered
    /// `_1`, `_2`, ... suffixes so every use keeps its own file.
    pub fn register(
        &mut self,
        material: usize,
        material_name: &str,
        channel: TextureChannel,
        image: &ImageRef,
    ) -> Result<u32, ExportError> {
        if let Some(&index) = self.by_use.get(&(material, channel)) {
            return Ok(index);
        }

        let index = encode_texture_index(self.entries.len() as u32)?;
        let name = self.unique_name(&sanitize_name(&format!(
            "{}_{}",
            material_name,
            channel.suffix()
        )));
        let file_name = format!("{}.{}", name, JJ_FORMAT.texture_ext);
        let table_path = if self.texture_dir.is_empty() {
            file_name
        } else {
            format!("{}/{}", self.texture_dir, file_name)
        };

        debug!(
            "Texture {}: {} (from image '{}')",
            index, table_path, image.name
        );
        self.by_use.insert((material, channel), index);
        self.names.insert(name.clone());
        self.entries.push(TextureEntry {
            name,
            channel,
            image: Arc::clone(&image.image),
            table_path,
        });
        Ok(index)
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.names.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn entries(&self) -> &[TextureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn table_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.table_path.as_str())
    }
}

/// Result of encoding a scene's materials
#[derive(Debug, Clone)]
pub struct EncodedMaterials {
    pub records: Vec<MaterialRecord>,
    /// Record index per scene material; `None` for unused materials
    pub material_ids: Vec<Option<u16>>,
    pub textures: TextureRegistry,
}

impl EncodedMaterials {
    /// Material id written for a triangle using `material`
    pub fn id_of(&self, material: Option<usize>) -> u16 {
        material
            .and_then(|m| self.material_ids.get(m).copied().flatten())
            .unwrap_or(0)
    }
}

/// Encode every material with at least one user, in scene order
pub fn encode_materials(
    materials: &[Material],
    texture_dir: &str,
) -> Result<EncodedMaterials, ExportError> {
    let used = materials.iter().filter(|m| m.users > 0).count();
    if used > MAX_MATERIALS {
        return Err(ExportError::TooManyMaterials(used));
    }

    let mut textures = TextureRegistry::new(texture_dir);
    let mut records = Vec::with_capacity(used);
    let mut material_ids = Vec::with_capacity(materials.len());

    for (index, material) in materials.iter().enumerate() {
        if material.users == 0 {
            debug!("Skipping unused material '{}'", material.name);
            material_ids.push(None);
            continue;
        }
        material_ids.push(Some(records.len() as u16));
        records.push(encode_material(index, material, &mut textures)?);
    }

    Ok(EncodedMaterials {
        records,
        material_ids,
        textures,
    })
}

/// Encode scene material `material_index`, registering the textures it references
pub fn encode_material(
    material_index: usize,
    material: &Material,
    textures: &mut TextureRegistry,
) -> Result<MaterialRecord, ExportError> {
    let fallback;
    let inputs = match &material.surface {
        SurfaceOutput::Principled(inputs) => inputs,
        SurfaceOutput::Missing => {
            warn!(
                "Material '{}' has no surface output, using default values",
                material.name
            );
            fallback = PrincipledInputs::default();
            &fallback
        }
        SurfaceOutput::Unsupported { node_kind } => {
            warn!(
                "Material '{}' uses unsupported surface node '{}', using default values",
                material.name, node_kind
            );
            fallback = PrincipledInputs::default();
            &fallback
        }
    };

    let name = material.name.as_str();
    let mut field =
        |link: &InputLink, channel: TextureChannel| -> Result<Option<u32>, ExportError> {
            match resolve_image(name, link, channel) {
                Some(image) => Ok(Some(textures.register(material_index, name, channel, image)?)),
                None => Ok(None),
            }
        };

    let base_color = match field(&inputs.base_color.link, TextureChannel::BaseColor)? {
        Some(index) => index,
        None => {
            let [r, g, b, _] = inputs.base_color.default;
            MaterialRecord::color_word(Vec3::new(r, g, b))
        }
    };
    let metallic = match field(&inputs.metallic.link, TextureChannel::Metallic)? {
        Some(index) => index,
        None => MaterialRecord::scalar_word(inputs.metallic.default),
    };
    let roughness = match field(&inputs.roughness.link, TextureChannel::Roughness)? {
        Some(index) => index,
        None => MaterialRecord::scalar_word(inputs.roughness.default),
    };
    let normal = field(&inputs.normal, TextureChannel::Normal)?.unwrap_or(GEOMETRIC_NORMAL);

    Ok(MaterialRecord {
        base_color,
        metallic,
        roughness,
        normal,
    })
}

/// Image behind an input, unwrapping at most one normal-map node
fn resolve_image<'a>(
    material: &str,
    link: &'a InputLink,
    channel: TextureChannel,
) -> Option<&'a ImageRef> {
    let unsupported = |kind: &str| {
        warn!(
            "Material '{}': {} input is driven by unsupported node '{}', using its default",
            material,
            channel.suffix(),
            kind
        );
    };

    match link {
        InputLink::Unlinked => None,
        InputLink::Image(image) => Some(image),
        InputLink::NormalMap(inner) => match inner.as_ref() {
            InputLink::Image(image) => Some(image),
            InputLink::Unlinked => None,
            InputLink::NormalMap(_) => {
                unsupported("nested normal map");
                None
            }
            InputLink::Unsupported { node_kind } => {
                unsupported(node_kind);
                None
            }
        },
        InputLink::Unsupported { node_kind } => {
            unsupported(node_kind);
            None
        }
    }
}
