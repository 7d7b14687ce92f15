//! Texture export: raw images plus GPU block compression
//!
//! Raw images are written as PNG next to the scene; compression is delegated
//! to a [`TextureCompressor`]. Outputs that already exist are left alone, so
//! re-exporting a scene only compresses new textures.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use jj_common::JJ_FORMAT;

use crate::error::ExportError;
use crate::material::{CompressionProfile, TextureEntry, TextureRegistry};

/// Converts a raw image into the runtime texture format
pub trait TextureCompressor {
    fn compress(
        &self,
        input: &Path,
        output: &Path,
        profile: CompressionProfile,
    ) -> Result<(), ExportError>;
}

/// NVIDIA Texture Tools command-line compressor
#[derive(Debug, Clone)]
pub struct Nvcompress {
    program: PathBuf,
}

impl Nvcompress {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Format flags per profile, always emitting DX10 headers
    pub fn profile_args(profile: CompressionProfile) -> &'static [&'static str] {
        match profile {
            CompressionProfile::Color => &["-bc7", "-color", "-dds10"],
            CompressionProfile::Normal => &["-bc5", "-normal", "-dds10"],
            CompressionProfile::Mono => &["-bc4", "-dds10"],
        }
    }
}

impl Default for Nvcompress {
    fn default() -> Self {
        Self::new("nvcompress")
    }
}

impl TextureCompressor for Nvcompress {
    fn compress(
        &self,
        input: &Path,
        output: &Path,
        profile: CompressionProfile,
    ) -> Result<(), ExportError> {
        let failed = |reason: String| ExportError::CompressorFailed {
            path: input.to_path_buf(),
            reason,
        };

        let status = Command::new(&self.program)
            .args(Self::profile_args(profile))
            .arg(input)
            .arg(output)
            .status()
            .map_err(|e| failed(format!("failed to run {:?}: {}", self.program, e)))?;

        if !status.success() {
            return Err(failed(format!(
                "exit code {}",
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            )));
        }
        Ok(())
    }
}

/// Leaves textures uncompressed
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipCompression;

impl TextureCompressor for SkipCompression {
    fn compress(
        &self,
        input: &Path,
        _output: &Path,
        _profile: CompressionProfile,
    ) -> Result<(), ExportError> {
        debug!("Compression disabled, keeping {:?}", input);
        Ok(())
    }
}

/// Where texture files go, relative to the output directory
#[derive(Debug, Clone)]
pub struct TextureLayout {
    /// Scene output directory; table paths resolve against it
    pub output_dir: PathBuf,
    /// Directory for raw PNG images
    pub raw_dir: PathBuf,
}

impl TextureLayout {
    pub fn raw_path(&self, entry: &TextureEntry) -> PathBuf {
        self.raw_dir
            .join(format!("{}.{}", entry.name, JJ_FORMAT.raw_texture_ext))
    }

    pub fn compressed_path(&self, entry: &TextureEntry) -> PathBuf {
        self.output_dir.join(&entry.table_path)
    }
}

/// Outcome counts of a texture export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureStats {
    pub written: usize,
    pub compressed: usize,
    pub up_to_date: usize,
}

/// Pixel layout handed to the compressor for a profile
fn prepare_image(image: &DynamicImage, profile: CompressionProfile) -> DynamicImage {
    match profile {
        CompressionProfile::Mono => DynamicImage::ImageLuma8(image.to_luma8()),
        CompressionProfile::Color | CompressionProfile::Normal => {
            DynamicImage::ImageRgba8(image.to_rgba8())
        }
    }
}

/// Write every registered texture and compress the ones not yet compressed
pub fn export_textures(
    registry: &TextureRegistry,
    layout: &TextureLayout,
    compressor: &dyn TextureCompressor,
) -> Result<TextureStats> {
    let mut stats = TextureStats::default();
    if registry.is_empty() {
        return Ok(stats);
    }

    std::fs::create_dir_all(&layout.raw_dir)
        .with_context(|| format!("Failed to create {:?}", layout.raw_dir))?;

    for entry in registry.entries() {
        let profile = entry.channel.profile();
        let raw_path = layout.raw_path(entry);

        prepare_image(&entry.image, profile)
            .save_with_format(&raw_path, ImageFormat::Png)
            .with_context(|| format!("Failed to write texture image {:?}", raw_path))?;
        stats.written += 1;

        let output = layout.compressed_path(entry);
        if output.exists() {
            debug!("{:?} is up to date", output);
            stats.up_to_date += 1;
            continue;
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        compressor.compress(&raw_path, &output, profile)?;
        stats.compressed += 1;
    }

    info!(
        "Textures: {} written, {} compressed, {} up to date",
        stats.written, stats.compressed, stats.up_to_date
    );
    Ok(stats)
}
