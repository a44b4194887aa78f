use super::{
    compose::{Declaration, Gate, ShaderStage, ShaderTables, Snippet},
    vertex::{LOCATION_V_FOG_FACTOR, LOCATION_V_LIGHT, LOCATION_V_TEX_COORD_1, LOCATION_V_TEX_COORD_2},
    ShaderFeature,
};

/// How one texture layer combines with the color accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerOp {
    Opaque,
    Mod,
    Mod2x,
    /// mod2x without touching alpha
    Mod2xNA,
    Add,
    /// additive without touching alpha
    AddNA,
}
impl LayerOp {
    fn combine(self, sample: &str) -> String {
        match self {
            LayerOp::Opaque => format!("color = vec4<f32>(color.rgb * {sample}.rgb, color.a);"),
            LayerOp::Mod => format!("color = color * {sample};"),
            LayerOp::Mod2x => format!("color = vec4<f32>(color.rgb * {sample}.rgb * 2.0, color.a * {sample}.a * 2.0);"),
            LayerOp::Mod2xNA => format!("color = vec4<f32>(color.rgb * {sample}.rgb * 2.0, color.a);"),
            LayerOp::Add => format!("color = color + {sample};"),
            LayerOp::AddNA => format!("color = vec4<f32>(color.rgb + {sample}.rgb, color.a);"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentShaderKind {
    Opaque,
    Mod,
    OpaqueOpaque,
    OpaqueMod,
    OpaqueMod2x,
    OpaqueMod2xNA,
    OpaqueAdd,
    ModMod,
    ModMod2x,
    ModAdd,
    ModMod2xNA,
    ModAddNA,
    ModOpaque,
    Unknown,
}
impl FragmentShaderKind {
    pub fn from_raw(raw: u16) -> Option<Self> {
        use FragmentShaderKind::*;
        Some(match raw {
            0 => Opaque,
            1 => Mod,
            2 => OpaqueOpaque,
            3 => OpaqueMod,
            4 => OpaqueMod2x,
            5 => OpaqueMod2xNA,
            6 => OpaqueAdd,
            7 => ModMod,
            8 => ModMod2x,
            9 => ModAdd,
            10 => ModMod2xNA,
            11 => ModAddNA,
            12 => ModOpaque,
            _ => return None,
        })
    }

    pub fn layers(self) -> (Option<LayerOp>, Option<LayerOp>) {
        use FragmentShaderKind as K;
        use LayerOp as L;
        match self {
            K::Opaque => (Some(L::Opaque), None),
            K::Mod => (Some(L::Mod), None),
            K::OpaqueOpaque => (Some(L::Opaque), Some(L::Opaque)),
            K::OpaqueMod => (Some(L::Opaque), Some(L::Mod)),
            K::OpaqueMod2x => (Some(L::Opaque), Some(L::Mod2x)),
            K::OpaqueMod2xNA => (Some(L::Opaque), Some(L::Mod2xNA)),
            K::OpaqueAdd => (Some(L::Opaque), Some(L::Add)),
            K::ModMod => (Some(L::Mod), Some(L::Mod)),
            K::ModMod2x => (Some(L::Mod), Some(L::Mod2x)),
            K::ModAdd => (Some(L::Mod), Some(L::Add)),
            K::ModMod2xNA => (Some(L::Mod), Some(L::Mod2xNA)),
            K::ModAddNA => (Some(L::Mod), Some(L::AddNA)),
            K::ModOpaque => (Some(L::Mod), Some(L::Opaque)),
            K::Unknown => (None, None),
        }
    }
}

const MAIN_LIGHTING: &str = "
color = vec4<f32>(color.rgb * (u.sun_ambient + u.sun_diffuse * input.v_light), color.a);
";

const MAIN_TEXTURE_WEIGHT: &str = "
color.a = color.a * u.texture_weight;
";

const MAIN_ALPHA_TEST: &str = "
if (color.a < u.alpha_ref) {
    discard;
}
";

const MAIN_FOG: &str = "
color = vec4<f32>(mix(color.rgb, u.fog_color, input.v_fog_factor), color.a);
";

pub fn fragment_tables(kind: FragmentShaderKind) -> ShaderTables {
    let mut t = ShaderTables::new(ShaderStage::Fragment);
    let (layer_1, layer_2) = kind.layers();

    // one block layout for every variant; mirrored by `material::FragmentUniforms`
    t.uniforms = vec![
        Declaration::new("material_color", "vec4<f32>"),
        Declaration::new("sun_diffuse", "vec3<f32>"),
        Declaration::new("sun_ambient", "vec3<f32>"),
        Declaration::new("fog_color", "vec3<f32>"),
        Declaration::new("texture_weight", "f32"),
        Declaration::new("alpha_ref", "f32"),
    ];

    if layer_1.is_some() {
        t.bindings.push(Declaration::new("texture_1", "texture_2d<f32>"));
        t.bindings.push(Declaration::new("sampler_1", "sampler"));
    }
    if layer_2.is_some() {
        t.bindings.push(Declaration::new("texture_2", "texture_2d<f32>"));
        t.bindings.push(Declaration::new("sampler_2", "sampler"));
    }

    t.inputs = vec![
        Declaration::new("v_light", "f32").at(LOCATION_V_LIGHT),
        Declaration::new("v_fog_factor", "f32").at(LOCATION_V_FOG_FACTOR),
    ];
    if layer_1.is_some() {
        t.inputs.push(Declaration::new("v_tex_coord_1", "vec2<f32>").at(LOCATION_V_TEX_COORD_1));
    }
    if layer_2.is_some() {
        t.inputs.push(Declaration::new("v_tex_coord_2", "vec2<f32>").at(LOCATION_V_TEX_COORD_2));
    }
    t.outputs = vec![Declaration::new("color", "vec4<f32>").at(0)];

    t.main.push(Snippet::always("var color = u.material_color;"));
    if let Some(op) = layer_1 {
        t.main.push(Snippet::always("let tex_1 = textureSample(texture_1, sampler_1, input.v_tex_coord_1);"));
        t.main.push(Snippet::always(op.combine("tex_1")));
    }
    if let Some(op) = layer_2 {
        t.main.push(Snippet::always("let tex_2 = textureSample(texture_2, sampler_2, input.v_tex_coord_2);"));
        t.main.push(Snippet::always(op.combine("tex_2")));
    }
    t.main.push(Snippet::gated(MAIN_LIGHTING, Gate::Unless(ShaderFeature::Unlit)));
    t.main.push(Snippet::always(MAIN_TEXTURE_WEIGHT));
    t.main.push(Snippet::gated(MAIN_ALPHA_TEST, Gate::If(ShaderFeature::AlphaTest)));
    t.main.push(Snippet::gated(MAIN_FOG, Gate::Unless(ShaderFeature::Unfogged)));
    t.main.push(Snippet::always("output.color = color;"));
    t
}
