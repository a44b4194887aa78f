use super::{
    compose::{Declaration, Gate, ShaderStage, ShaderTables, Snippet},
    fog, ShaderFeature,
};
use crate::renderer::geometry::ModelVertex;

pub const LOCATION_V_LIGHT: u32 = 0;
pub const LOCATION_V_FOG_FACTOR: u32 = 1;
pub const LOCATION_V_TEX_COORD_1: u32 = 2;
pub const LOCATION_V_TEX_COORD_2: u32 = 3;

/// Source of one output texture coordinate channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexCoordSource {
    T1,
    T2,
    /// sphere mapped from view space position and normal
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexShaderKind {
    T1,
    T2,
    Env,
    T1T2,
    T1Env,
    EnvT2,
    EnvEnv,
    Unknown,
}
impl VertexShaderKind {
    pub fn from_raw(raw: u16) -> Option<Self> {
        use VertexShaderKind::*;
        Some(match raw {
            0 => T1,
            1 => T2,
            2 => Env,
            3 => T1T2,
            4 => T1Env,
            5 => EnvT2,
            6 => EnvEnv,
            _ => return None,
        })
    }

    pub fn channels(self) -> (Option<TexCoordSource>, Option<TexCoordSource>) {
        use TexCoordSource as C;
        match self {
            VertexShaderKind::T1 => (Some(C::T1), None),
            VertexShaderKind::T2 => (Some(C::T2), None),
            VertexShaderKind::Env => (Some(C::Env), None),
            VertexShaderKind::T1T2 => (Some(C::T1), Some(C::T2)),
            VertexShaderKind::T1Env => (Some(C::T1), Some(C::Env)),
            VertexShaderKind::EnvT2 => (Some(C::Env), Some(C::T2)),
            VertexShaderKind::EnvEnv => (Some(C::Env), Some(C::Env)),
            VertexShaderKind::Unknown => (None, None),
        }
    }
}

const FUNCTION_SPHERE_MAP: &str = "
fn sphere_map(position: vec3<f32>, normal: vec3<f32>) -> vec2<f32> {
    let view_position = normalize((u.model_view_matrix * vec4<f32>(position, 1.0)).xyz);
    let view_normal = normalize(u.normal_matrix * normal);

    var temp = -view_position - view_normal * (2.0 * dot(-view_position, view_normal));
    temp = vec3<f32>(temp.x, temp.y, temp.z + 1.0);

    return normalize(temp).xy * 0.5 + vec2<f32>(0.5);
}
";

// four consecutive texels hold one column-major bone matrix
const FUNCTION_GET_BONE_MATRIX: &str = "
fn get_bone_matrix(i: u32) -> mat4x4<f32> {
    let size = textureDimensions(bone_texture, 0).x;
    let j = i * 4u;
    let x = j % size;
    let y = j / size;

    let v1 = textureLoad(bone_texture, vec2<u32>(x, y), 0);
    let v2 = textureLoad(bone_texture, vec2<u32>(x + 1u, y), 0);
    let v3 = textureLoad(bone_texture, vec2<u32>(x + 2u, y), 0);
    let v4 = textureLoad(bone_texture, vec2<u32>(x + 3u, y), 0);

    return mat4x4<f32>(v1, v2, v3, v4);
}
";

const MAIN_SKINNING: &str = "
let bone_mat_x = get_bone_matrix(input.bone_indices.x);
let bone_mat_y = get_bone_matrix(input.bone_indices.y);
let bone_mat_z = get_bone_matrix(input.bone_indices.z);
let bone_mat_w = get_bone_matrix(input.bone_indices.w);
";

const MAIN_OBJECT_NORMAL: &str = "
var object_normal = input.normal;
";

const MAIN_SKIN_NORMAL: &str = "
var skin_matrix = input.bone_weights.x * bone_mat_x
    + input.bone_weights.y * bone_mat_y
    + input.bone_weights.z * bone_mat_z
    + input.bone_weights.w * bone_mat_w;
skin_matrix = u.bind_matrix_inverse * skin_matrix * u.bind_matrix;
object_normal = (skin_matrix * vec4<f32>(object_normal, 0.0)).xyz;
";

const MAIN_LIGHTING: &str = "
let view_normal = normalize(u.normal_matrix * object_normal);
output.v_light = clamp(dot(view_normal, -u.sun_dir), 0.0, 1.0);
";

const MAIN_POSITION: &str = "
output.clip_position = u.projection_matrix * u.model_view_matrix * vec4<f32>(input.position, 1.0);
";

const MAIN_SKINNED_POSITION: &str = "
let skin_vertex = u.bind_matrix * vec4<f32>(input.position, 1.0);
let skinned = bone_mat_x * skin_vertex * input.bone_weights.x
    + bone_mat_y * skin_vertex * input.bone_weights.y
    + bone_mat_z * skin_vertex * input.bone_weights.z
    + bone_mat_w * skin_vertex * input.bone_weights.w;
let skinned_position = (u.bind_matrix_inverse * skinned).xyz;
output.clip_position = u.projection_matrix * u.model_view_matrix * vec4<f32>(skinned_position, 1.0);
";

fn channel_assignment(output: &str, transform: usize, source: TexCoordSource) -> String {
    match source {
        TexCoordSource::T1 => format!(
            "output.{output} = (u.texture_transforms[{transform}] * vec4<f32>(input.tex_coord_1, 0.0, 1.0)).xy;"
        ),
        TexCoordSource::T2 => format!(
            "output.{output} = (u.texture_transforms[{transform}] * vec4<f32>(input.tex_coord_2, 0.0, 1.0)).xy;"
        ),
        TexCoordSource::Env => format!("output.{output} = sphere_map(input.position, input.normal);"),
    }
}

pub fn vertex_tables(kind: VertexShaderKind) -> ShaderTables {
    let skinning = Gate::If(ShaderFeature::Skinning);
    let mut t = ShaderTables::new(ShaderStage::Vertex);

    // one block layout for every variant; mirrored by `material::VertexUniforms`
    t.uniforms = vec![
        Declaration::new("bind_matrix", "mat4x4<f32>"),
        Declaration::new("bind_matrix_inverse", "mat4x4<f32>"),
        Declaration::new("model_matrix", "mat4x4<f32>"),
        Declaration::new("model_view_matrix", "mat4x4<f32>"),
        Declaration::new("normal_matrix", "mat3x3<f32>"),
        Declaration::new("projection_matrix", "mat4x4<f32>"),
        Declaration::new("camera_position", "vec3<f32>"),
        Declaration::new("sun_dir", "vec3<f32>"),
        Declaration::new("texture_transforms", "array<mat4x4<f32>, 2>"),
        fog::UNIFORM_FOG_PARAMS,
    ];
    t.bindings = vec![Declaration::new("bone_texture", "texture_2d<f32>").gated(skinning)];

    let (channel_1, channel_2) = kind.channels();
    let channels = [channel_1, channel_2];
    let uses = |source: TexCoordSource| channels.contains(&Some(source));

    t.inputs = vec![
        Declaration::new("position", "vec3<f32>").at(ModelVertex::LOCATION_POSITION),
        Declaration::new("bone_weights", "vec4<f32>")
            .at(ModelVertex::LOCATION_BONE_WEIGHTS)
            .gated(skinning),
        Declaration::new("bone_indices", "vec4<u32>")
            .at(ModelVertex::LOCATION_BONE_INDICES)
            .gated(skinning),
        Declaration::new("normal", "vec3<f32>").at(ModelVertex::LOCATION_NORMAL),
    ];
    if uses(TexCoordSource::T1) {
        t.inputs.push(Declaration::new("tex_coord_1", "vec2<f32>").at(ModelVertex::LOCATION_TEX_COORD_1));
    }
    if uses(TexCoordSource::T2) {
        t.inputs.push(Declaration::new("tex_coord_2", "vec2<f32>").at(ModelVertex::LOCATION_TEX_COORD_2));
    }

    t.outputs = vec![
        Declaration::new("v_light", "f32").at(LOCATION_V_LIGHT),
        Declaration::new(fog::VARYING_FOG_FACTOR, "f32").at(LOCATION_V_FOG_FACTOR),
    ];
    if channel_1.is_some() {
        t.outputs.push(Declaration::new("v_tex_coord_1", "vec2<f32>").at(LOCATION_V_TEX_COORD_1));
    }
    if channel_2.is_some() {
        t.outputs.push(Declaration::new("v_tex_coord_2", "vec2<f32>").at(LOCATION_V_TEX_COORD_2));
    }

    t.functions = vec![
        Snippet::always(FUNCTION_SPHERE_MAP),
        Snippet::gated(FUNCTION_GET_BONE_MATRIX, skinning),
        fog::fog_function(),
    ];

    if let Some(source) = channel_1 {
        t.main.push(Snippet::always(channel_assignment("v_tex_coord_1", 0, source)));
    }
    if let Some(source) = channel_2 {
        t.main.push(Snippet::always(channel_assignment("v_tex_coord_2", 1, source)));
    }
    t.main.push(Snippet::gated(MAIN_SKINNING, skinning));
    t.main.push(Snippet::always(MAIN_OBJECT_NORMAL));
    t.main.push(Snippet::gated(MAIN_SKIN_NORMAL, skinning));
    t.main.push(Snippet::always(MAIN_LIGHTING));
    t.main.push(Snippet::always(fog::MAIN_FOG));
    t.main.push(Snippet::gated(MAIN_POSITION, Gate::Unless(ShaderFeature::Skinning)));
    t.main.push(Snippet::gated(MAIN_SKINNED_POSITION, skinning));
    t
}
