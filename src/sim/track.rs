use std::cmp::Ordering;

use glam::{Quat, Vec3, Vec4};

use crate::resource_system::file_formats::modelspec::{TrackSpec, FIXED_POINT_ONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Catmull-Rom for floats, smoothstepped slerp for rotations
    Smooth,
}
impl Interpolation {
    pub fn from_track_type(raw: u16) -> Self {
        match raw {
            0 => Interpolation::Step,
            1 => Interpolation::Linear,
            2 | 3 => Interpolation::Smooth,
            _ => Interpolation::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Scalar,
    Vector,
    Quaternion,
    Color,
}
impl TrackKind {
    /// Floats per key in the flattened raw key array.
    pub fn components(self) -> usize {
        match self {
            TrackKind::Scalar => 1,
            TrackKind::Vector | TrackKind::Color => 3,
            TrackKind::Quaternion => 4,
        }
    }
}

/// Transform from raw encoded key values into engine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remap {
    Identity,
    /// `v / 0x7fff`
    FixedPoint,
    /// Rotation components stored offset by half the 16 bit range.
    SignedFold,
}
impl Remap {
    pub fn apply(self, value: f32) -> f32 {
        match self {
            Remap::Identity => value,
            Remap::FixedPoint => value / FIXED_POINT_ONE,
            Remap::SignedFold => {
                if value > 0.0 {
                    (value - FIXED_POINT_ONE) / FIXED_POINT_ONE
                } else {
                    (value + FIXED_POINT_ONE) / FIXED_POINT_ONE
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackValue {
    Scalar(f32),
    Vector(Vec3),
    Quaternion(Quat),
    Color(Vec3),
}
impl TrackValue {
    fn from_vec4(kind: TrackKind, v: Vec4) -> Self {
        match kind {
            TrackKind::Scalar => TrackValue::Scalar(v.x),
            TrackKind::Vector => TrackValue::Vector(v.truncate()),
            TrackKind::Quaternion => TrackValue::Quaternion(Quat::from_vec4(v)),
            TrackKind::Color => TrackValue::Color(v.truncate()),
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            TrackValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            TrackValue::Vector(v) | TrackValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<Quat> {
        match self {
            TrackValue::Quaternion(q) => Some(*q),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct KeySequence {
    times: Vec<f32>,
    // every kind is stored widened to four lanes
    values: Vec<Vec4>,
}

/// Decoded keyframes of one animated property, one key sequence per model sequence.
#[derive(Debug, Clone)]
pub struct KeyframeTrack {
    kind: TrackKind,
    interpolation: Interpolation,
    loop_index: Option<usize>,
    sequences: Vec<KeySequence>,
}
impl KeyframeTrack {
    pub fn new(spec: &TrackSpec, kind: TrackKind, remap: Remap) -> Self {
        let components = kind.components();
        let sequences = spec
            .sequence_times
            .iter()
            .enumerate()
            .map(|(seq, times)| {
                let keys = spec.sequence_keys.get(seq).map(Vec::as_slice).unwrap_or(&[]);
                let key_count = times.len().min(keys.len() / components);
                if key_count != times.len() || keys.len() != key_count * components {
                    log::warn!(
                        "track sequence {seq}: {} times but {} floats for {:?} keys, truncating to {key_count}",
                        times.len(),
                        keys.len(),
                        kind
                    );
                }
                let values = keys
                    .chunks_exact(components)
                    .take(key_count)
                    .map(|raw| {
                        let mut lanes = [0.0f32; 4];
                        for (lane, value) in lanes.iter_mut().zip(raw) {
                            *lane = remap.apply(*value);
                        }
                        let v = Vec4::from_array(lanes);
                        if kind == TrackKind::Quaternion {
                            v.try_normalize().unwrap_or(Vec4::W)
                        } else {
                            v
                        }
                    })
                    .collect();
                KeySequence {
                    times: times.iter().take(key_count).map(|t| *t as f32).collect(),
                    values,
                }
            })
            .collect();

        Self {
            kind,
            interpolation: Interpolation::from_track_type(spec.interpolation),
            loop_index: spec.loop_index.map(usize::from),
            sequences,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Global loop this track follows instead of the active sequence.
    pub fn loop_index(&self) -> Option<usize> {
        self.loop_index
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn key_count(&self, sequence: usize) -> usize {
        self.sequences.get(sequence).map_or(0, |s| s.times.len())
    }

    /// Samples `sequence` at `time_ms`, clamping outside the keyed range.
    /// `None` when the sequence has no keys.
    pub fn sample(&self, sequence: usize, time_ms: f32) -> Option<TrackValue> {
        let seq = self.sequences.get(sequence)?;
        if seq.values.is_empty() {
            return None;
        }
        let (i0, i1, alpha) = keyframe_span(&seq.times, time_ms);
        let (v0, v1) = (seq.values[i0], seq.values[i1]);

        let value = match (self.interpolation, self.kind) {
            _ if i0 == i1 => v0,
            (Interpolation::Step, _) => v0,
            (Interpolation::Linear, TrackKind::Quaternion) => {
                Vec4::from(Quat::from_vec4(v0).slerp(Quat::from_vec4(v1), alpha))
            }
            (Interpolation::Linear, _) => v0.lerp(v1, alpha),
            (Interpolation::Smooth, TrackKind::Quaternion) => {
                let t = alpha * alpha * (3.0 - 2.0 * alpha);
                Vec4::from(Quat::from_vec4(v0).slerp(Quat::from_vec4(v1), t))
            }
            (Interpolation::Smooth, _) => {
                let before = seq.values[i0.saturating_sub(1)];
                let after = seq.values[(i1 + 1).min(seq.values.len() - 1)];
                catmull_rom(before, v0, v1, after, alpha)
            }
        };
        Some(TrackValue::from_vec4(self.kind, value))
    }
}

fn bin_search_anim_indices(times: &[f32], val: f32) -> (usize, usize) {
    let n = times.len();
    if n <= 1 {
        return (0, 0);
    }

    match times.binary_search_by(|x| x.partial_cmp(&val).unwrap_or(Ordering::Greater)) {
        Ok(i) => (i, i),
        Err(0) => (0, 0),
        Err(i) if i >= n => (n - 1, n - 1),
        Err(i) => (i - 1, i),
    }
}

/// Surrounding key indices and the normalized factor between them.
fn keyframe_span(times: &[f32], t: f32) -> (usize, usize, f32) {
    let (i0, i1) = bin_search_anim_indices(times, t);
    let (t0, t1) = (times[i0], times[i1]);
    let alpha = if i0 == i1 || (t1 - t0).abs() < f32::EPSILON {
        0.0
    } else {
        (t - t0) / (t1 - t0)
    };
    (i0, i1, alpha)
}

fn catmull_rom(p0: Vec4, p1: Vec4, p2: Vec4, p3: Vec4, t: f32) -> Vec4 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}
