//! jj-export - jj scene export tool
//!
//! Converts authored scenes (glTF/GLB) to the GPU-ready jj formats
//! (.jj scene files, .janim animation files, compressed textures)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use jj_export::formats::{
    decode_texture_name, AnimationHeader, BinarySerializable, MaterialField, MaterialRecord,
    SceneHeader, TEXTURE_NAME_SIZE,
};
use jj_export::manifest;
use jj_export::texture::{
    export_textures, Nvcompress, SkipCompression, TextureCompressor, TextureLayout,
};
use jj_export::{
    export_animations, export_scene, write_scene_file, AnimationOptions, ExportOptions,
    GltfSource, SkinningMode, JJ_FORMAT,
};

#[derive(Parser)]
#[command(name = "jj-export")]
#[command(about = "jj scene export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build scenes from a manifest file
    Build {
        /// Path to export.toml manifest
        #[arg(default_value = "export.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to export.toml manifest
        #[arg(default_value = "export.toml")]
        manifest: PathBuf,
    },

    /// Export a single scene file
    Scene {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output .jj file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Never write skin data
        #[arg(long)]
        no_skin: bool,

        /// Write raw textures without running the compressor
        #[arg(long)]
        no_compress: bool,
    },

    /// Export animation actions from glTF, one .janim per action
    Animation {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output directory (default: next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Action to export (repeatable; default: all)
        #[arg(short, long)]
        action: Vec<String>,

        /// Output sample rate (default: one sample per authored frame)
        #[arg(short, long)]
        frame_rate: Option<f32>,

        /// Frame rate used to convert source seconds into frames
        #[arg(long, default_value_t = jj_export::source::DEFAULT_SOURCE_FPS)]
        source_fps: f32,

        /// List available actions instead of exporting
        #[arg(long)]
        list: bool,
    },

    /// Print the contents of a .jj or .janim file
    Inspect {
        /// File to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { manifest, output } => {
            tracing::info!("Building scenes from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Scene {
            input,
            output,
            no_skin,
            no_compress,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(JJ_FORMAT.scene_ext));
            tracing::info!("Exporting {:?} -> {:?}", input, output);

            let source = GltfSource::open(&input, jj_export::source::DEFAULT_SOURCE_FPS)?;
            let scene = source.load_scene()?;
            let options = ExportOptions {
                skinning: if no_skin {
                    SkinningMode::Never
                } else {
                    SkinningMode::Auto
                },
                ..Default::default()
            };
            let exported = export_scene(&scene, &options)?;
            write_scene_file(&exported, &output)?;

            let output_dir = output.parent().unwrap_or(Path::new(".")).to_path_buf();
            let layout = TextureLayout {
                raw_dir: output_dir.join("textures_raw"),
                output_dir,
            };
            let compressor: Box<dyn TextureCompressor> = if no_compress {
                Box::new(SkipCompression)
            } else {
                Box::new(Nvcompress::default())
            };
            export_textures(&exported.textures, &layout, compressor.as_ref())?;
            tracing::info!("Done!");
        }

        Commands::Animation {
            input,
            output,
            action,
            frame_rate,
            source_fps,
            list,
        } => {
            let source = GltfSource::open(&input, source_fps)?;
            let scene = source.load_scene()?;

            if list {
                if scene.actions.is_empty() {
                    tracing::info!("No actions found in {:?}", input);
                    return Ok(());
                }
                tracing::info!("Actions in {:?}:", input);
                for (i, action) in scene.actions.iter().enumerate() {
                    tracing::info!(
                        "  [{}] '{}': frames {}..={}",
                        i,
                        action.name,
                        action.frame_start,
                        action.frame_end
                    );
                }
                return Ok(());
            }

            let output_dir = output
                .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).to_path_buf());
            let options = AnimationOptions {
                frame_rate,
                actions: action,
            };
            let mut evaluator = source.pose_evaluator()?;
            let written = export_animations(&scene, &mut evaluator, &options, &output_dir)?;
            tracing::info!("Done! {} animation files", written.len());
        }

        Commands::Inspect { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let ext = file
                .extension()
                .and_then(|e| e.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();

            if ext == JJ_FORMAT.scene_ext {
                inspect_scene(&file, &bytes)?;
            } else if ext == JJ_FORMAT.animation_ext {
                inspect_animation(&file, &bytes)?;
            } else {
                anyhow::bail!(
                    "Unsupported file: {:?} (use .{} or .{})",
                    file,
                    JJ_FORMAT.scene_ext,
                    JJ_FORMAT.animation_ext
                );
            }
        }
    }

    Ok(())
}

fn describe_field(field: MaterialField, textures: &[String]) -> String {
    match field {
        MaterialField::Texture(index) => match textures.get(index as usize) {
            Some(name) => format!("texture {} ({})", index, name),
            None => format!("texture {} (out of range)", index),
        },
        MaterialField::Color([r, g, b]) => format!("color ({:.3}, {:.3}, {:.3})", r, g, b),
        MaterialField::Scalar(value) => format!("{:.3}", value),
        MaterialField::GeometricNormal => "geometric".to_string(),
    }
}

/// Parse a fixed-size record, naming the file on failure
fn read_record<T: BinarySerializable>(path: &Path, bytes: &[u8], what: &str) -> Result<T> {
    T::deserialize(bytes).with_context(|| format!("{:?} is not a jj {} file", path, what))
}

fn inspect_scene(path: &Path, bytes: &[u8]) -> Result<()> {
    let header: SceneHeader = read_record(path, bytes, "scene")?;
    if bytes.len() != header.file_size() {
        anyhow::bail!(
            "{:?}: expected {} bytes, found {}",
            path,
            header.file_size(),
            bytes.len()
        );
    }

    let textures_start = header.texture_names_offset();
    let textures: Vec<String> = bytes[textures_start..]
        .chunks_exact(TEXTURE_NAME_SIZE)
        .take(header.texture_count as usize)
        .map(|field| decode_texture_name(field).unwrap_or_else(|| "<invalid>".to_string()))
        .collect();

    tracing::info!("Scene {:?}:", path);
    tracing::info!("  version: {}", header.version);
    tracing::info!("  triangles: {}", header.triangle_count);
    tracing::info!("  skinned: {}", header.has_skin_data);
    tracing::info!("  materials: {}", header.material_count);
    let materials_start = header.materials_offset();
    for (i, record) in bytes[materials_start..]
        .chunks_exact(MaterialRecord::SIZE)
        .take(header.material_count as usize)
        .filter_map(MaterialRecord::deserialize)
        .enumerate()
    {
        tracing::info!(
            "    [{}] base color {}, metallic {}, roughness {}, normal {}",
            i,
            describe_field(record.base_color_field(), &textures),
            describe_field(record.metallic_field(), &textures),
            describe_field(record.roughness_field(), &textures),
            describe_field(record.normal_field(), &textures)
        );
    }
    tracing::info!("  textures: {}", header.texture_count);
    for (i, name) in textures.iter().enumerate() {
        tracing::info!("    [{}] {}", i, name);
    }
    Ok(())
}

fn inspect_animation(path: &Path, bytes: &[u8]) -> Result<()> {
    let header: AnimationHeader = read_record(path, bytes, "animation")?;
    if bytes.len() != header.file_size() {
        anyhow::bail!(
            "{:?}: expected {} bytes, found {}",
            path,
            header.file_size(),
            bytes.len()
        );
    }

    tracing::info!("Animation {:?}:", path);
    tracing::info!("  frames: {}", header.frame_count);
    tracing::info!("  bones: {}", header.bone_count);
    tracing::info!("  matrices per block: {}", header.matrix_count());
    Ok(())
}
