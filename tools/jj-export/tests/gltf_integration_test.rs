//! Integration tests for the glTF/GLB export pipeline.
//!
//! Tests the complete flow:
//! 1. Generate GLB programmatically
//! 2. Load it through the glTF source and export it
//! 3. Validate the written scene and animation files


use glam::{Mat4, Vec3};
use std::path::Path;
use tempfile::tempdir;

use jj_export::animation::{animation_path, export_animations, AnimationOptions};
use jj_export::export::{export_scene, scene_path, write_scene_file, ExportOptions};
use jj_export::formats::{
    decode_texture_name, matrix_from_row_major, AnimationHeader, MaterialField, MaterialRecord,
    SceneHeader, MATERIAL_RECORD_SIZE, MATRIX_SIZE, POSITION_SIZE, SHADE_SIZE,
    SKIN_INDICES_SIZE, SKIN_WEIGHTS_SIZE, TEXTURE_NAME_SIZE,
};
use jj_export::scene::{ObjectKind, Scene};
use jj_export::source::GltfSource;
use jj_export::ExportError;

const SOURCE_FPS: f32 = 24.0;

fn load(dir: &Path) -> (GltfSource, Scene) {
    let path = dir.join("hero.glb");
    gltf_generator::write_scene_glb(&path);
    let source = GltfSource::open(&path, SOURCE_FPS).expect("Failed to open GLB");
    let scene = source.load_scene().expect("Failed to load scene");
    (source, scene)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn test_scene_model_from_glb() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (_, scene) = load(dir.path());

    assert_eq!(scene.name, "hero");
    let names: Vec<&str> = scene.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Armature", "Sword", "SkinnedMesh", "WGT-Root"]);
    assert!(matches!(scene.objects[0].kind, ObjectKind::Armature));

    let sword = &scene.objects[1];
    assert_eq!(sword.parent_bone.as_deref(), Some("Root"));
    assert!(!sword.armature_bound);
    let offset = sword.world_transform.transform_point3(Vec3::ZERO);
    assert!(offset.abs_diff_eq(Vec3::from(gltf_generator::SWORD_OFFSET), 1e-6));

    let skinned = &scene.objects[2];
    assert!(skinned.armature_bound);
    assert_eq!(skinned.world_transform, Mat4::IDENTITY);
    let mesh = skinned.as_mesh().unwrap();
    assert_eq!(mesh.triangle_count(), gltf_generator::SKINNED_TRIANGLES);
    assert_eq!(mesh.material_slots, vec![Some(0), Some(1)]);
    assert_eq!(mesh.vertex_groups, gltf_generator::BONE_NAMES);
    assert_eq!(mesh.vertex_weights[2], vec![(0, 0.5), (1, 0.5)]);

    // First corner: glTF (0, 1) becomes authoring (0, 0); the side triangle
    // has no UVs and gets the placeholder
    let uvs = mesh.corner_uvs.as_ref().unwrap();
    assert_eq!(uvs[0], [0.0, 0.0]);
    assert_eq!(uvs[uvs.len() - 1], [0.5, 0.5]);

    assert_eq!(scene.skeletons.len(), 1);
    let bones: Vec<&str> = scene.skeletons[0].bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(bones, gltf_generator::BONE_NAMES);

    assert_eq!(scene.actions.len(), 1);
    assert_eq!(scene.actions[0].name, "Wave");
    assert_eq!(scene.actions[0].frame_start, 0);
    assert_eq!(scene.actions[0].frame_end, 24);

    let materials: Vec<(&str, u32)> = scene
        .materials
        .iter()
        .map(|m| (m.name.as_str(), m.users))
        .collect();
    assert_eq!(materials, [("Skin", 1), ("Steel", 1)]);
}

#[test]
fn test_export_scene_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (_, scene) = load(dir.path());

    let exported = export_scene(&scene, &ExportOptions::default()).expect("Export failed");
    let path = scene_path(dir.path(), &exported.name);
    write_scene_file(&exported, &path).expect("Failed to write scene");

    let bytes = std::fs::read(&path).expect("Failed to read scene file");
    let header = SceneHeader::from_bytes(&bytes).expect("Invalid header");
    let triangles = gltf_generator::SWORD_TRIANGLES + gltf_generator::SKINNED_TRIANGLES;
    assert_eq!(header.triangle_count as usize, triangles);
    assert_eq!(header.material_count, 2);
    assert_eq!(header.texture_count, 3);
    assert!(header.has_skin_data);
    assert_eq!(bytes.len(), header.file_size());

    // The sword comes first: rigid, offset from the root, normals repaired to +Y
    let corners = header.corner_count();
    let position = |corner: usize| {
        let offset = SceneHeader::SIZE + corner * POSITION_SIZE;
        Vec3::new(
            read_f32(&bytes, offset),
            read_f32(&bytes, offset + 4),
            read_f32(&bytes, offset + 8),
        )
    };
    let shade_start = SceneHeader::SIZE + corners * POSITION_SIZE;
    let shade = |corner: usize, i: usize| {
        read_f32(&bytes, shade_start + corner * SHADE_SIZE + i * 4)
    };

    assert!(position(0).abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    assert!(position(1).abs_diff_eq(Vec3::new(1.0, 0.5, 0.0), 1e-6));
    assert_eq!([shade(0, 0), shade(0, 1), shade(0, 2)], [0.0, 1.0, 0.0]);

    // Skinned corners keep their bind positions and renderer-space UVs
    assert!(position(3).abs_diff_eq(Vec3::new(-0.5, 0.0, 0.0), 1e-6));
    assert_eq!([shade(3, 3), shade(3, 4)], [0.0, 1.0]);

    // Material ids: sword has no material, then six Skin triangles and one Steel
    let ids: Vec<u16> = bytes[header.material_ids_offset()..header.materials_offset()]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(ids, [0, 0, 0, 0, 0, 0, 0, 1]);

    let record = |i: usize| {
        let offset = header.materials_offset() + i * MATERIAL_RECORD_SIZE;
        MaterialRecord::from_bytes(&bytes[offset..]).unwrap()
    };
    let skin = record(0);
    assert_eq!(skin.base_color_field(), MaterialField::Texture(0));
    assert_eq!(skin.metallic_field(), MaterialField::Texture(1));
    assert_eq!(skin.roughness_field(), MaterialField::Texture(2));
    assert_eq!(skin.normal_field(), MaterialField::GeometricNormal);

    let steel = record(1);
    match steel.base_color_field() {
        MaterialField::Color(color) => {
            assert!(Vec3::from(color).abs_diff_eq(Vec3::splat(0.5), 1e-3));
        }
        other => panic!("Expected constant color, got {:?}", other),
    }
    assert_eq!(steel.metallic_field(), MaterialField::Scalar(1.0));
    assert_eq!(steel.roughness_field(), MaterialField::Scalar(0.25));

    let names: Vec<String> = bytes[header.texture_names_offset()..header.skin_offset()]
        .chunks_exact(TEXTURE_NAME_SIZE)
        .map(|field| decode_texture_name(field).unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "textures/Skin_base_color.dds",
            "textures/Skin_metallic.dds",
            "textures/Skin_roughness.dds",
        ]
    );

    // Skin block: indices for every corner, then weights
    let indices_start = header.skin_offset();
    let weights_start = indices_start + corners * SKIN_INDICES_SIZE;
    assert_eq!(bytes.len(), weights_start + corners * SKIN_WEIGHTS_SIZE);
    for corner in 0..corners {
        let sum: f32 = (0..4)
            .map(|i| read_f32(&bytes, weights_start + corner * SKIN_WEIGHTS_SIZE + i * 4))
            .sum();
        assert!((sum - 1.0).abs() < 1e-5, "corner {} weights sum to {}", corner, sum);
    }
    // Sword corners are bound to the Root bone alone
    assert_eq!(read_u32(&bytes, indices_start), 0);
    assert_eq!(read_f32(&bytes, weights_start), 1.0);
    // Side triangle is bound to the Head bone
    let last = corners - 1;
    assert_eq!(read_u32(&bytes, indices_start + last * SKIN_INDICES_SIZE), 2);
}

#[test]
fn test_export_animation_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (source, scene) = load(dir.path());
    let mut evaluator = source.pose_evaluator().expect("Failed to build evaluator");

    let out = dir.path().join("anims");
    let written = export_animations(&scene, &mut evaluator, &AnimationOptions::default(), &out)
        .expect("Animation export failed");
    let path = animation_path(&out, "Wave");
    assert_eq!(written, vec![path.clone()]);

    let bytes = std::fs::read(&path).expect("Failed to read animation file");
    let header = AnimationHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.frame_count, 25);
    assert_eq!(header.bone_count, gltf_generator::BONE_COUNT as u32);
    assert_eq!(bytes.len(), header.file_size());

    let matrix = |block: usize, frame: usize, bone: usize| {
        let index = block * header.matrix_count() + frame * gltf_generator::BONE_COUNT + bone;
        let offset = AnimationHeader::SIZE + index * MATRIX_SIZE;
        let mut rows = [0.0f32; 16];
        for (i, value) in rows.iter_mut().enumerate() {
            *value = read_f32(&bytes, offset + i * 4);
        }
        matrix_from_row_major(&rows)
    };

    // The first frame matches the bind pose
    for bone in 0..gltf_generator::BONE_COUNT {
        assert!(matrix(0, 0, bone).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    // Last frame: the root has risen, the spine has turned 90 degrees about Z
    let last = header.frame_count as usize - 1;
    let root = matrix(0, last, 0);
    let rise = Vec3::new(0.0, gltf_generator::ROOT_RISE, 0.0);
    assert!(root.transform_point3(Vec3::ZERO).abs_diff_eq(rise, 1e-5));

    let spine = matrix(0, last, 1);
    let head_bind = Vec3::new(0.0, 2.0 * gltf_generator::SEGMENT_HEIGHT, 0.0);
    let expected = Vec3::new(-1.0, 3.0, 0.0);
    assert!(spine.transform_point3(head_bind).abs_diff_eq(expected, 1e-5));

    // Adjugate block carries the rotation for normals
    let spine_normals = matrix(1, last, 1);
    assert!(spine_normals
        .transform_vector3(Vec3::X)
        .abs_diff_eq(Vec3::Y, 1e-5));
}

#[test]
fn test_resampled_animation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (source, scene) = load(dir.path());
    let mut evaluator = source.pose_evaluator().unwrap();

    let options = AnimationOptions {
        frame_rate: Some(12.0),
        actions: vec!["Wave".to_string()],
    };
    let written = export_animations(&scene, &mut evaluator, &options, dir.path()).unwrap();
    let bytes = std::fs::read(&written[0]).unwrap();
    let header = AnimationHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.frame_count, 13);
}

#[test]
fn test_unknown_action_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (source, scene) = load(dir.path());
    let mut evaluator = source.pose_evaluator().unwrap();

    let options = AnimationOptions {
        frame_rate: None,
        actions: vec!["Jump".to_string()],
    };
    let err = export_animations(&scene, &mut evaluator, &options, dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ExportError>(),
        Some(ExportError::UnknownAction(name)) if name == "Jump"
    ));
    assert!(!animation_path(dir.path(), "Jump").exists());
}
