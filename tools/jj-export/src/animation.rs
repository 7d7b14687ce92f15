//! Skeletal animation sampling and export
//!
//! Each action is sampled at evenly spaced times across its frame range. Per
//! frame and bone two matrices are stored, both combined with the bone's
//! inverse bind matrix: the forward pose for positions and its adjugate for
//! normals.

use anyhow::{bail, Context, Result};
use glam::Mat4;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use jj_common::JJ_FORMAT;

use crate::error::ExportError;
use crate::formats::write_animation;
use crate::material::sanitize_name;
use crate::scene::{Action, FrameTime, PoseEvaluator, Scene, Skeleton};
use crate::transform::adjugate_transpose4;

/// Saves the evaluator's frame and action and puts them back when dropped
///
/// Dereferences to the evaluator, so sampling goes through the guard and the
/// state is restored on every exit path, errors included.
pub struct PoseGuard<'a, P: PoseEvaluator + ?Sized> {
    evaluator: &'a mut P,
    frame: FrameTime,
    action: Option<String>,
}

impl<'a, P: PoseEvaluator + ?Sized> PoseGuard<'a, P> {
    pub fn new(evaluator: &'a mut P) -> Self {
        let frame = evaluator.frame();
        let action = evaluator.action();
        Self {
            evaluator,
            frame,
            action,
        }
    }
}

impl<P: PoseEvaluator + ?Sized> Deref for PoseGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.evaluator
    }
}

impl<P: PoseEvaluator + ?Sized> DerefMut for PoseGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.evaluator
    }
}

impl<P: PoseEvaluator + ?Sized> Drop for PoseGuard<'_, P> {
    fn drop(&mut self) {
        match self.action.take() {
            Some(name) => {
                if let Err(err) = self.evaluator.set_action(&name) {
                    warn!("Failed to restore action '{}': {:#}", name, err);
                    self.evaluator.clear_action();
                }
            }
            None => self.evaluator.clear_action(),
        }
        self.evaluator.set_frame(self.frame);
    }
}

/// Matrices of one sampled action
#[derive(Debug, Clone)]
pub struct SampledAnimation {
    pub name: String,
    pub frame_count: u32,
    pub bone_count: u32,
    /// Frame-major: `forward[frame * bone_count + bone]`
    pub forward: Vec<Mat4>,
    pub adjugate: Vec<Mat4>,
}

impl SampledAnimation {
    pub fn forward_at(&self, frame: usize, bone: usize) -> Mat4 {
        self.forward[frame * self.bone_count as usize + bone]
    }

    pub fn adjugate_at(&self, frame: usize, bone: usize) -> Mat4 {
        self.adjugate[frame * self.bone_count as usize + bone]
    }
}

/// Highest output sample rate accepted for animation export
pub const MAX_FRAME_RATE: f32 = 1000.0;

/// Number of frames to sample for an action
///
/// Without an output rate every authored frame is sampled; otherwise the
/// duration is resampled to `output_fps`. Never less than one.
pub fn frame_count_for(action: &Action, scene_fps: f32, output_fps: Option<f32>) -> usize {
    let span = (action.frame_end - action.frame_start).max(0);
    match output_fps {
        Some(fps) if fps > 0.0 && scene_fps > 0.0 => {
            let frames = (span as f64 / scene_fps as f64 * fps as f64).round() as usize;
            frames.saturating_add(1)
        }
        _ => span as usize + 1,
    }
}

/// `count` evenly spaced times from the first to the last frame, inclusive
pub fn sample_times(action: &Action, count: usize) -> Vec<FrameTime> {
    let start = action.frame_start as f64;
    let end = action.frame_end as f64;
    if count <= 1 {
        return vec![FrameTime::from_fractional(start)];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count)
        .map(|i| {
            // Pin the last sample to the end frame
            let time = if i == count - 1 {
                end
            } else {
                start + step * i as f64
            };
            FrameTime::from_fractional(time)
        })
        .collect()
}

/// Sample one action; the evaluator's frame and action are restored afterwards
pub fn sample_action<P: PoseEvaluator + ?Sized>(
    evaluator: &mut P,
    skeleton: &Skeleton,
    action: &Action,
    frame_count: usize,
) -> Result<SampledAnimation> {
    let mut guard = PoseGuard::new(evaluator);
    guard
        .set_action(&action.name)
        .with_context(|| format!("Failed to select action '{}'", action.name))?;

    let bone_count = skeleton.bones.len();
    let times = sample_times(action, frame_count);
    let mut forward = Vec::with_capacity(times.len() * bone_count);
    let mut adjugate = Vec::with_capacity(times.len() * bone_count);

    for time in &times {
        guard.set_frame(*time);
        let poses = guard.bone_to_armature()?;
        if poses.len() != bone_count {
            return Err(ExportError::BoneCountMismatch {
                expected: bone_count,
                actual: poses.len(),
            }
            .into());
        }

        for (pose, bone) in poses.iter().zip(&skeleton.bones) {
            forward.push(*pose * bone.inverse_bind);
            adjugate.push(adjugate_transpose4(pose) * bone.inverse_bind);
        }
    }
    drop(guard);

    debug!(
        "Sampled '{}': {} frames from {}..={}",
        action.name,
        times.len(),
        action.frame_start,
        action.frame_end
    );

    Ok(SampledAnimation {
        name: action.name.clone(),
        frame_count: times.len() as u32,
        bone_count: bone_count as u32,
        forward,
        adjugate,
    })
}

/// Animation export settings
#[derive(Debug, Clone, Default)]
pub struct AnimationOptions {
    /// Output sample rate; `None` samples every authored frame
    pub frame_rate: Option<f32>,
    /// Only export these actions (all when empty)
    pub actions: Vec<String>,
}

/// Output file for an action
pub fn animation_path(output_dir: &Path, action: &str) -> PathBuf {
    output_dir.join(format!(
        "{}.{}",
        sanitize_name(action),
        JJ_FORMAT.animation_ext
    ))
}

/// Sample and write the scene's actions, one file each
pub fn export_animations<P: PoseEvaluator + ?Sized>(
    scene: &Scene,
    evaluator: &mut P,
    options: &AnimationOptions,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let skeleton = match scene.skeletons.as_slice() {
        [skeleton] => skeleton,
        others => return Err(ExportError::SkeletonCount(others.len()).into()),
    };

    if let Some(fps) = options.frame_rate {
        if !(fps.is_finite() && fps > 0.0 && fps <= MAX_FRAME_RATE) {
            return Err(ExportError::InvalidFrameRate(fps).into());
        }
    }

    for wanted in &options.actions {
        if !scene.actions.iter().any(|a| &a.name == wanted) {
            return Err(ExportError::UnknownAction(wanted.clone()).into());
        }
    }

    let actions: Vec<&Action> = scene
        .actions
        .iter()
        .filter(|a| options.actions.is_empty() || options.actions.contains(&a.name))
        .collect();
    if actions.is_empty() {
        bail!("Scene '{}' has no actions to export", scene.name);
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {:?}", output_dir))?;

    let mut written = Vec::with_capacity(actions.len());
    for action in actions {
        let frame_count = frame_count_for(action, scene.frame_rate, options.frame_rate);
        let sampled = sample_action(&mut *evaluator, skeleton, action, frame_count)?;

        let path = animation_path(output_dir, &action.name);
        let file =
            File::create(&path).with_context(|| format!("Failed to create output: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        write_animation(&mut writer, &sampled)?;
        writer.flush()?;

        info!(
            "Exported animation '{}': {} bones, {} frames -> {:?}",
            action.name, sampled.bone_count, sampled.frame_count, path
        );
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Bone;
    use glam::Vec3;

    /// Two bones; bone 0 slides along x with time, bone 1 is scaled
    struct SlidingEvaluator {
        current: FrameTime,
        action: Option<String>,
        visited: Vec<FrameTime>,
        fail_at: Option<i32>,
    }

    impl SlidingEvaluator {
        fn new() -> Self {
            Self {
                current: FrameTime::new(7, 0.5),
                action: None,
                visited: Vec::new(),
                fail_at: None,
            }
        }
    }

    impl PoseEvaluator for SlidingEvaluator {
        fn frame(&self) -> FrameTime {
            self.current
        }

        fn set_frame(&mut self, time: FrameTime) {
            self.current = time;
            self.visited.push(time);
        }

        fn action(&self) -> Option<String> {
            self.action.clone()
        }

        fn set_action(&mut self, name: &str) -> Result<()> {
            self.action = Some(name.to_string());
            Ok(())
        }

        fn clear_action(&mut self) {
            self.action = None;
        }

        fn bone_to_armature(&self) -> Result<Vec<Mat4>> {
            if Some(self.current.frame) == self.fail_at {
                bail!("evaluation failed at frame {}", self.current.frame);
            }
            let x = self.current.as_fractional() as f32;
            Ok(vec![
                Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
                Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)),
            ])
        }
    }

    fn skeleton() -> Skeleton {
        Skeleton {
            name: "Armature".into(),
            bones: vec![
                Bone {
                    name: "Root".into(),
                    inverse_bind: Mat4::IDENTITY,
                },
                Bone {
                    name: "Tip".into(),
                    inverse_bind: Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
                },
            ],
        }
    }

    fn action(start: i32, end: i32) -> Action {
        Action {
            name: "Walk".into(),
            frame_start: start,
            frame_end: end,
        }
    }

    #[test]
    fn test_frame_count() {
        let walk = action(1, 24);
        assert_eq!(frame_count_for(&walk, 24.0, None), 24);
        assert_eq!(frame_count_for(&walk, 24.0, Some(48.0)), 47);
        assert_eq!(frame_count_for(&action(5, 5), 24.0, Some(60.0)), 1);
    }

    #[test]
    fn test_sample_times_inclusive() {
        let times = sample_times(&action(0, 3), 7);
        assert_eq!(times.len(), 7);
        assert_eq!(times[0], FrameTime::new(0, 0.0));
        assert_eq!(times[1], FrameTime::new(0, 0.5));
        assert_eq!(times[6], FrameTime::new(3, 0.0));

        assert_eq!(sample_times(&action(2, 9), 1), vec![FrameTime::new(2, 0.0)]);
    }

    #[test]
    fn test_sampled_matrices() {
        let mut evaluator = SlidingEvaluator::new();
        let sampled = sample_action(&mut evaluator, &skeleton(), &action(0, 2), 3).unwrap();

        assert_eq!(sampled.frame_count, 3);
        assert_eq!(sampled.bone_count, 2);
        assert_eq!(sampled.forward.len(), 6);
        assert_eq!(evaluator.action, None);

        let root = sampled.forward_at(2, 0);
        assert_eq!(root.w_axis.x, 2.0);

        // Scale (2, 1, 1) then inverse bind: translation is not scaled along y
        let tip = sampled.forward_at(0, 1);
        assert!(tip.abs_diff_eq(
            Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0))
                * Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            1e-6
        ));

        // Cofactor of diag(2, 1, 1, 1) is diag(1, 2, 2, 2)
        let adj = sampled.adjugate_at(0, 1);
        let expected = Mat4::from_diagonal(glam::Vec4::new(1.0, 2.0, 2.0, 2.0))
            * Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));
        assert!(adj.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_frame_restored() {
        let mut evaluator = SlidingEvaluator::new();
        sample_action(&mut evaluator, &skeleton(), &action(0, 4), 5).unwrap();
        assert_eq!(evaluator.frame(), FrameTime::new(7, 0.5));
        assert_eq!(evaluator.visited.len(), 6);
    }

    #[test]
    fn test_frame_restored_on_error() {
        let mut evaluator = SlidingEvaluator::new();
        evaluator.fail_at = Some(2);
        let result = sample_action(&mut evaluator, &skeleton(), &action(0, 4), 5);
        assert!(result.is_err());
        assert_eq!(evaluator.frame(), FrameTime::new(7, 0.5));
    }

    #[test]
    fn test_active_action_restored() {
        let mut evaluator = SlidingEvaluator::new();
        evaluator.set_action("Idle").unwrap();
        sample_action(&mut evaluator, &skeleton(), &action(0, 2), 3).unwrap();
        assert_eq!(evaluator.action.as_deref(), Some("Idle"));

        evaluator.fail_at = Some(1);
        assert!(sample_action(&mut evaluator, &skeleton(), &action(0, 2), 3).is_err());
        assert_eq!(evaluator.action.as_deref(), Some("Idle"));
        assert_eq!(evaluator.frame(), FrameTime::new(7, 0.5));
    }

    #[test]
    fn test_out_of_range_frame_rate_rejected() {
        let scene = Scene {
            name: "hero".into(),
            skeletons: vec![skeleton()],
            actions: vec![action(0, 3)],
            frame_rate: 24.0,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        for fps in [1e30, f32::INFINITY, 0.0, -24.0] {
            let options = AnimationOptions {
                frame_rate: Some(fps),
                ..Default::default()
            };
            let mut evaluator = SlidingEvaluator::new();
            let err = export_animations(&scene, &mut evaluator, &options, dir.path()).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ExportError>(),
                Some(ExportError::InvalidFrameRate(_))
            ));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_requires_one_skeleton() {
        let scene = Scene {
            name: "empty".into(),
            actions: vec![action(0, 1)],
            frame_rate: 24.0,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = export_animations(
            &scene,
            &mut SlidingEvaluator::new(),
            &AnimationOptions::default(),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::SkeletonCount(0))
        ));
    }

    #[test]
    fn test_export_writes_files() {
        let scene = Scene {
            name: "hero".into(),
            skeletons: vec![skeleton()],
            actions: vec![
                action(0, 3),
                Action {
                    name: "Idle Loop".into(),
                    frame_start: 0,
                    frame_end: 1,
                },
            ],
            frame_rate: 24.0,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let options = AnimationOptions {
            frame_rate: None,
            actions: vec!["Idle Loop".into()],
        };
        let written =
            export_animations(&scene, &mut SlidingEvaluator::new(), &options, dir.path()).unwrap();

        assert_eq!(written, vec![dir.path().join("Idle_Loop.janim")]);
        let bytes = std::fs::read(&written[0]).unwrap();
        let header = jj_common::AnimationHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.frame_count, 2);
        assert_eq!(header.bone_count, 2);
        assert_eq!(bytes.len(), header.file_size());
    }

    #[test]
    fn test_export_unknown_action() {
        let scene = Scene {
            name: "hero".into(),
            skeletons: vec![skeleton()],
            actions: vec![action(0, 3)],
            frame_rate: 24.0,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let options = AnimationOptions {
            frame_rate: None,
            actions: vec!["Run".into()],
        };
        let err = export_animations(&scene, &mut SlidingEvaluator::new(), &options, dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("Run"));
    }
}
