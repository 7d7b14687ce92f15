//! Scene geometry: per-object assembly into one consolidated triangle soup

mod assembly;
mod consolidate;

pub use assembly::{assemble_object, flip_uv, AssemblyStats, MISSING_UV};
pub use consolidate::{ConsolidatedMesh, MeshConsolidator, ShadeRecord, SkinArrays, Triangle};
