use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use glam::{Mat4, Quat, Vec3};

use crate::{
    error::AnimationError,
    renderer::{
        camera::Camera,
        skeleton::{BonePose, ModelSkeleton},
    },
    resource_system::file_formats::modelspec::{SequenceSpec, TrackSpec},
};

use super::track::{KeyframeTrack, Remap, TrackKind, TrackValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackCategory {
    Bones,
    TextureTransforms,
    MaterialColors,
    TextureWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackProperty {
    Translation,
    Rotation,
    Scale,
    Color,
    Alpha,
    Weight,
}

/// Which animated value a track drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackTarget {
    pub category: TrackCategory,
    pub index: usize,
    pub property: Option<TrackProperty>,
}
impl TrackTarget {
    pub fn new(category: TrackCategory, index: usize, property: TrackProperty) -> Self {
        Self {
            category,
            index,
            property: Some(property),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scaling: Vec3,
}
impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scaling: Vec3::ONE,
        }
    }
}
impl TextureTransform {
    /// Rotation and scaling pivot around the texture center.
    pub fn matrix(&self) -> Mat4 {
        let center = Vec3::new(0.5, 0.5, 0.0);
        Mat4::from_translation(self.translation)
            * Mat4::from_translation(center)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scaling)
            * Mat4::from_translation(-center)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColor {
    pub color: Vec3,
    pub alpha: f32,
}
impl Default for MaterialColor {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            alpha: 1.0,
        }
    }
}

/// Latest evaluated value of every animated channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationState {
    pub bones: Vec<BonePose>,
    pub texture_transforms: Vec<TextureTransform>,
    pub material_colors: Vec<MaterialColor>,
    pub texture_weights: Vec<f32>,
}
impl AnimationState {
    fn reserve(&mut self, target: &TrackTarget) {
        let len = target.index + 1;
        match target.category {
            TrackCategory::Bones if self.bones.len() < len => self.bones.resize(len, BonePose::default()),
            TrackCategory::TextureTransforms if self.texture_transforms.len() < len => {
                self.texture_transforms.resize(len, TextureTransform::default())
            }
            TrackCategory::MaterialColors if self.material_colors.len() < len => {
                self.material_colors.resize(len, MaterialColor::default())
            }
            TrackCategory::TextureWeights if self.texture_weights.len() < len => self.texture_weights.resize(len, 1.0),
            _ => {}
        }
    }

    /// Writes a sampled value, or the rest value when the track had no keys.
    fn apply(&mut self, target: &TrackTarget, value: Option<TrackValue>) {
        use TrackCategory as C;
        use TrackProperty as P;
        let vec3_or = |rest: Vec3| value.and_then(|v| v.as_vec3()).unwrap_or(rest);
        let quat = || value.and_then(|v| v.as_quat()).unwrap_or(Quat::IDENTITY);
        let scalar = || value.and_then(|v| v.as_scalar()).unwrap_or(1.0);
        let i = target.index;

        match (target.category, target.property) {
            (C::Bones, Some(P::Translation)) => self.bones[i].translation = vec3_or(Vec3::ZERO),
            (C::Bones, Some(P::Rotation)) => self.bones[i].rotation = quat(),
            (C::Bones, Some(P::Scale)) => self.bones[i].scale = vec3_or(Vec3::ONE),
            (C::TextureTransforms, Some(P::Translation)) => {
                self.texture_transforms[i].translation = vec3_or(Vec3::ZERO)
            }
            (C::TextureTransforms, Some(P::Rotation)) => self.texture_transforms[i].rotation = quat(),
            (C::TextureTransforms, Some(P::Scale)) => self.texture_transforms[i].scaling = vec3_or(Vec3::ONE),
            (C::MaterialColors, Some(P::Color)) => self.material_colors[i].color = vec3_or(Vec3::ONE),
            (C::MaterialColors, Some(P::Alpha)) => self.material_colors[i].alpha = scalar(),
            (C::TextureWeights, None | Some(P::Weight)) => self.texture_weights[i] = scalar(),
            (category, property) => {
                log::trace!("no animated value for {:?} {:?}", category, property);
            }
        }
    }
}

#[derive(Debug)]
struct RegisteredTrack {
    target: TrackTarget,
    track: KeyframeTrack,
}

/// Plays one sequence at a time over every registered track and rebakes the
/// skeletons attached to it.
#[derive(Debug)]
pub struct ModelAnimator {
    loops: Vec<u32>,
    sequences: Vec<SequenceSpec>,
    tracks: Vec<RegisteredTrack>,
    state: AnimationState,
    sequence: usize,
    /// playhead inside the active sequence, ms
    time: f32,
    /// ms since creation, drives global loops
    global_time: f32,
    speed: f32,
    has_bone_tracks: bool,
    skeletons: Vec<Weak<RefCell<ModelSkeleton>>>,
}

impl ModelAnimator {
    pub fn new(loops: Vec<u32>, sequences: Vec<SequenceSpec>, bone_count: usize) -> Self {
        Self {
            loops,
            sequences,
            tracks: vec![],
            state: AnimationState {
                bones: vec![BonePose::default(); bone_count],
                ..Default::default()
            },
            sequence: 0,
            time: 0.0,
            global_time: 0.0,
            speed: 1.0,
            has_bone_tracks: false,
            skeletons: vec![],
        }
    }

    pub fn register_track(&mut self, target: TrackTarget, raw: &TrackSpec, kind: TrackKind, remap: Remap) {
        self.state.reserve(&target);
        if target.category == TrackCategory::Bones {
            self.has_bone_tracks = true;
        }
        let track = KeyframeTrack::new(raw, kind, remap);
        // rest values until the first update
        self.state.apply(&target, None);
        self.tracks.push(RegisteredTrack { target, track });
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_count_for(&self, category: TrackCategory) -> usize {
        self.tracks.iter().filter(|t| t.target.category == category).count()
    }

    pub fn loops(&self) -> &[u32] {
        &self.loops
    }

    pub fn sequences(&self) -> &[SequenceSpec] {
        &self.sequences
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Playhead in milliseconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_sequence(&mut self, index: usize) -> Result<(), AnimationError> {
        if index >= self.sequences.len() {
            return Err(AnimationError::UnknownSequence {
                index,
                count: self.sequences.len(),
            });
        }
        self.sequence = index;
        self.time = 0.0;
        Ok(())
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn attach_skeleton(&mut self, skeleton: &Rc<RefCell<ModelSkeleton>>) {
        self.skeletons.push(Rc::downgrade(skeleton));
    }

    /// Skeletons still alive and attached.
    pub fn skeleton_count(&self) -> usize {
        self.skeletons.iter().filter(|s| s.strong_count() > 0).count()
    }

    fn advance(&mut self, delta_ms: f32) {
        self.global_time += delta_ms;
        let Some(sequence) = self.sequences.get(self.sequence) else {
            return;
        };
        let duration = sequence.duration as f32;
        self.time = if duration <= 0.0 {
            0.0
        } else if sequence.looping {
            (self.time + delta_ms).rem_euclid(duration)
        } else {
            (self.time + delta_ms).clamp(0.0, duration)
        };
    }

    /// Sequence and time a track samples at the current playhead.
    fn track_time(&self, track: &KeyframeTrack) -> (usize, f32) {
        match track.loop_index() {
            Some(loop_index) => {
                let duration = self.loops.get(loop_index).copied().unwrap_or(0) as f32;
                let time = if duration > 0.0 {
                    self.global_time.rem_euclid(duration)
                } else {
                    0.0
                };
                (0, time)
            }
            None => (self.sequence, self.time),
        }
    }

    /// Advances by `delta_time` seconds and rebakes attached skeletons for `camera`.
    pub fn update(&mut self, delta_time: f32, camera: &Camera) {
        self.advance(delta_time * 1000.0 * self.speed);

        for i in 0..self.tracks.len() {
            let (sequence, time) = self.track_time(&self.tracks[i].track);
            let value = self.tracks[i].track.sample(sequence, time);
            self.state.apply(&self.tracks[i].target, value);
        }

        if !self.has_bone_tracks {
            return;
        }
        self.skeletons.retain(|skeleton| skeleton.strong_count() > 0);
        for skeleton in self.skeletons.iter().filter_map(Weak::upgrade) {
            skeleton.borrow_mut().update_bones(camera, &self.state.bones);
        }
    }
}
