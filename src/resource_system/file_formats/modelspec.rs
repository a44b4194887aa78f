use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Largest encodable fixed-point value, used as "1.0" by weight, alpha and rotation tracks.
pub const FIXED_POINT_ONE: f32 = 0x7fff as f32;

pub const TEXTURE_FLAG_WRAP_S: u32 = 0x1;
pub const TEXTURE_FLAG_WRAP_T: u32 = 0x2;

pub const MATERIAL_FLAG_UNLIT: u16 = 0x1;
pub const MATERIAL_FLAG_UNFOGGED: u16 = 0x2;
pub const MATERIAL_FLAG_TWO_SIDED: u16 = 0x4;
pub const MATERIAL_FLAG_DEPTH_TEST_DISABLED: u16 = 0x8;
pub const MATERIAL_FLAG_DEPTH_WRITE_DISABLED: u16 = 0x10;

pub const BONE_FLAG_SPHERICAL_BILLBOARD: u32 = 0x8;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DrawGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// min corner followed by max corner
    pub extent: [f32; 6],
    pub center: [f32; 3],
    pub radius: f32,
}
impl Default for Bounds {
    fn default() -> Self {
        Self {
            extent: [0.0; 6],
            center: [0.0; 3],
            radius: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometrySpec {
    pub vertex_buffer: Vec<u8>,
    pub index_buffer: Vec<u8>,
    pub groups: Vec<DrawGroup>,
}

/// Raw keyframes for one animated property.
///
/// `sequence_keys` holds one flattened value array per sequence: a key occupies
/// as many floats as the track kind has components.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TrackSpec {
    #[serde(default)]
    pub interpolation: u16,
    #[serde(default)]
    pub loop_index: Option<u16>,
    #[serde(default)]
    pub sequence_times: Vec<Vec<u32>>,
    #[serde(default)]
    pub sequence_keys: Vec<Vec<f32>>,
}
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BoneSpec {
    pub id: i32,
    #[serde(default)]
    pub flags: u32,
    pub parent: Option<u16>,
    pub pivot: [f32; 3],
    #[serde(default)]
    pub translation_track: TrackSpec,
    #[serde(default)]
    pub rotation_track: TrackSpec,
    #[serde(default)]
    pub scale_track: TrackSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TextureWeightSpec {
    pub weight_track: TrackSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TextureTransformSpec {
    #[serde(default)]
    pub translation_track: TrackSpec,
    #[serde(default)]
    pub rotation_track: TrackSpec,
    #[serde(default)]
    pub scaling_track: TrackSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MaterialColorSpec {
    #[serde(default)]
    pub color_track: TrackSpec,
    #[serde(default)]
    pub alpha_track: TrackSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SequenceSpec {
    pub id: u16,
    #[serde(default)]
    pub variation_index: u16,
    /// milliseconds
    pub duration: u32,
    #[serde(default = "default_looping")]
    pub looping: bool,
    #[serde(default)]
    pub blend_time: u32,
}

fn default_looping() -> bool {
    true
}

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlendMode {
    Opaque = 0,
    AlphaKey = 1,
    Alpha = 2,
    NoAlphaAdd = 3,
    Add = 4,
    Mod = 5,
    Mod2x = 6,
    BlendAdd = 7,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TextureSpec {
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub component: u32,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MaterialSpec {
    #[serde(default)]
    pub flags: u16,
    pub blend: BlendMode,
    pub vertex_shader: u16,
    pub fragment_shader: u16,
    #[serde(default)]
    pub textures: Vec<TextureSpec>,
    #[serde(default)]
    pub texture_weight_index: u16,
    #[serde(default)]
    pub texture_transform_indices: Vec<u16>,
    #[serde(default)]
    pub material_color_index: Option<u16>,
    #[serde(default)]
    pub bone_influences: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    /// radians, measured across the diagonal
    pub field_of_view: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub position_base: [f32; 3],
    pub target_base: [f32; 3],
}

/// Everything a format loader extracts from one model file.
#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    pub name: String,
    pub geometry: GeometrySpec,
    pub bounds: Bounds,
    pub materials: Vec<MaterialSpec>,
    pub bones: Vec<BoneSpec>,
    pub cameras: Vec<CameraSpec>,
    pub loops: Vec<u32>,
    pub sequences: Vec<SequenceSpec>,
    pub texture_weights: Vec<TextureWeightSpec>,
    pub texture_transforms: Vec<TextureTransformSpec>,
    pub material_colors: Vec<MaterialColorSpec>,
    pub skinned: bool,
}
