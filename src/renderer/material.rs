use std::{collections::BTreeSet, rc::Rc, sync::Arc};

use glam::{Mat3, Mat4, Vec4};

use crate::{
    renderer::{
        camera::Camera,
        lights::LightUniforms,
        shader::{ComposedShader, ShaderFeature},
    },
    resource_system::{
        file_formats::modelspec::{
            BlendMode, MaterialSpec, MATERIAL_FLAG_DEPTH_TEST_DISABLED, MATERIAL_FLAG_DEPTH_WRITE_DISABLED,
            MATERIAL_FLAG_TWO_SIDED, MATERIAL_FLAG_UNFOGGED, MATERIAL_FLAG_UNLIT,
        },
        texture::TextureHandle,
    },
    sim::animator::AnimationState,
};

/// Alpha below which alpha keyed materials discard their fragments.
pub const ALPHA_KEY_REF: f32 = 0.5;

/// Vertex stage uniform block, field for field the `VertexUniforms` struct the
/// shader composer emits.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexUniforms {
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
    pub model_matrix: Mat4,
    pub model_view_matrix: Mat4,
    /// mat3x3 columns, each padded to a vec4
    pub normal_matrix: [[f32; 4]; 3],
    pub projection_matrix: Mat4,
    pub camera_position: [f32; 3],
    pub _pad0: f32,
    pub sun_dir: [f32; 3],
    pub _pad1: f32,
    pub texture_transforms: [Mat4; 2],
    /// fog start and end in x/y
    pub fog_params: [f32; 4],
}
impl VertexUniforms {
    pub fn new(lights: &LightUniforms) -> Self {
        let mut uniforms = Self {
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inverse: Mat4::IDENTITY,
            model_matrix: Mat4::IDENTITY,
            model_view_matrix: Mat4::IDENTITY,
            normal_matrix: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            projection_matrix: Mat4::IDENTITY,
            camera_position: [0.0; 3],
            _pad0: 0.0,
            sun_dir: [0.0; 3],
            _pad1: 0.0,
            texture_transforms: [Mat4::IDENTITY; 2],
            fog_params: [0.0; 4],
        };
        uniforms.set_lighting(lights);
        uniforms
    }

    pub fn set_lighting(&mut self, lights: &LightUniforms) {
        self.sun_dir = lights.sun_dir;
        let [start, end] = lights.fog_params;
        self.fog_params = [start, end, 0.0, 0.0];
    }

    pub fn set_camera(&mut self, camera: &Camera, model: Mat4) {
        let model_view = camera.view_matrix() * model;
        let normal = Mat3::from_mat4(model_view).inverse().transpose();
        self.model_matrix = model;
        self.model_view_matrix = model_view;
        self.normal_matrix = [normal.x_axis, normal.y_axis, normal.z_axis].map(|c| c.extend(0.0).to_array());
        self.projection_matrix = camera.projection_matrix();
        self.camera_position = camera.position.to_array();
    }
}

/// Fragment stage uniform block, field for field the `FragmentUniforms` struct
/// the shader composer emits.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FragmentUniforms {
    pub material_color: Vec4,
    pub sun_diffuse: [f32; 3],
    pub _pad0: f32,
    pub sun_ambient: [f32; 3],
    pub _pad1: f32,
    pub fog_color: [f32; 3],
    pub texture_weight: f32,
    pub alpha_ref: f32,
    pub _pad2: [f32; 3],
}
impl FragmentUniforms {
    pub fn new(lights: &LightUniforms, alpha_ref: f32) -> Self {
        let mut uniforms = Self {
            material_color: Vec4::ONE,
            sun_diffuse: [0.0; 3],
            _pad0: 0.0,
            sun_ambient: [0.0; 3],
            _pad1: 0.0,
            fog_color: [0.0; 3],
            texture_weight: 1.0,
            alpha_ref,
            _pad2: [0.0; 3],
        };
        uniforms.set_lighting(lights);
        uniforms
    }

    pub fn set_lighting(&mut self, lights: &LightUniforms) {
        self.sun_diffuse = lights.sun_diffuse;
        self.sun_ambient = lights.sun_ambient;
        self.fog_color = lights.fog_color;
    }
}

/// Shader variant features a material needs.
pub fn shader_features(spec: &MaterialSpec, skinned: bool) -> BTreeSet<ShaderFeature> {
    let mut features = BTreeSet::new();
    if skinned && spec.bone_influences > 0 {
        features.insert(ShaderFeature::Skinning);
    }
    if spec.blend == BlendMode::AlphaKey {
        features.insert(ShaderFeature::AlphaTest);
    }
    if spec.flags & MATERIAL_FLAG_UNLIT != 0 {
        features.insert(ShaderFeature::Unlit);
    }
    if spec.flags & MATERIAL_FLAG_UNFOGGED != 0 {
        features.insert(ShaderFeature::Unfogged);
    }
    features
}

pub fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    use wgpu::{BlendComponent, BlendFactor as F, BlendOperation, BlendState};
    let add = |src_factor, dst_factor| BlendComponent {
        src_factor,
        dst_factor,
        operation: BlendOperation::Add,
    };
    match blend {
        BlendMode::Opaque | BlendMode::AlphaKey => None,
        BlendMode::Alpha => Some(BlendState::ALPHA_BLENDING),
        BlendMode::NoAlphaAdd => Some(BlendState {
            color: add(F::One, F::One),
            alpha: add(F::Zero, F::One),
        }),
        BlendMode::Add => Some(BlendState {
            color: add(F::SrcAlpha, F::One),
            alpha: add(F::Zero, F::One),
        }),
        BlendMode::Mod => Some(BlendState {
            color: add(F::Dst, F::Zero),
            alpha: add(F::DstAlpha, F::Zero),
        }),
        BlendMode::Mod2x => Some(BlendState {
            color: add(F::Dst, F::Src),
            alpha: add(F::DstAlpha, F::SrcAlpha),
        }),
        BlendMode::BlendAdd => Some(BlendState {
            color: add(F::One, F::OneMinusSrcAlpha),
            alpha: add(F::One, F::OneMinusSrcAlpha),
        }),
    }
}

#[derive(Debug)]
pub struct ModelMaterial {
    pub vertex_shader: Arc<ComposedShader>,
    pub fragment_shader: Arc<ComposedShader>,
    pub textures: Vec<Rc<TextureHandle>>,
    pub texture_weight_index: usize,
    pub texture_transform_indices: Vec<usize>,
    pub material_color_index: Option<usize>,
    pub skinned: bool,
    pub bone_influences: u16,
    pub vertex_uniforms: VertexUniforms,
    pub fragment_uniforms: FragmentUniforms,
    pub blend: BlendMode,
    pub flags: u16,
}

impl ModelMaterial {
    pub fn new(
        spec: &MaterialSpec,
        skinned: bool,
        vertex_shader: Arc<ComposedShader>,
        fragment_shader: Arc<ComposedShader>,
        textures: Vec<Rc<TextureHandle>>,
        lights: LightUniforms,
    ) -> Self {
        let alpha_ref = if spec.blend == BlendMode::AlphaKey { ALPHA_KEY_REF } else { 0.0 };
        Self {
            vertex_shader,
            fragment_shader,
            textures,
            texture_weight_index: spec.texture_weight_index as usize,
            texture_transform_indices: spec
                .texture_transform_indices
                .iter()
                .take(2)
                .map(|i| *i as usize)
                .collect(),
            material_color_index: spec.material_color_index.map(usize::from),
            skinned,
            bone_influences: spec.bone_influences,
            vertex_uniforms: VertexUniforms::new(&lights),
            fragment_uniforms: FragmentUniforms::new(&lights, alpha_ref),
            blend: spec.blend,
            flags: spec.flags,
        }
    }

    /// Copies the animated values this material references into its uniforms.
    pub fn prepare(&mut self, state: &AnimationState) {
        for (slot, index) in self.texture_transform_indices.iter().enumerate() {
            self.vertex_uniforms.texture_transforms[slot] = state
                .texture_transforms
                .get(*index)
                .map_or(Mat4::IDENTITY, |transform| transform.matrix());
        }
        self.fragment_uniforms.material_color = self
            .material_color_index
            .and_then(|index| state.material_colors.get(index))
            .map_or(Vec4::ONE, |c| c.color.extend(c.alpha));
        self.fragment_uniforms.texture_weight = state
            .texture_weights
            .get(self.texture_weight_index)
            .copied()
            .unwrap_or(1.0);
    }

    pub fn set_lighting(&mut self, lights: LightUniforms) {
        self.vertex_uniforms.set_lighting(&lights);
        self.fragment_uniforms.set_lighting(&lights);
    }

    /// Refreshes the transforms for drawing at `model` as seen by `camera`.
    pub fn set_camera(&mut self, camera: &Camera, model: Mat4) {
        self.vertex_uniforms.set_camera(camera, model);
    }

    /// Contents of the vertex stage uniform buffer (group 0, binding 0).
    pub fn vertex_uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.vertex_uniforms)
    }

    /// Contents of the fragment stage uniform buffer (group 1, binding 0).
    pub fn fragment_uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.fragment_uniforms)
    }

    pub fn is_two_sided(&self) -> bool {
        self.flags & MATERIAL_FLAG_TWO_SIDED != 0
    }

    pub fn depth_test(&self) -> bool {
        self.flags & MATERIAL_FLAG_DEPTH_TEST_DISABLED == 0
    }

    pub fn depth_write(&self) -> bool {
        self.flags & MATERIAL_FLAG_DEPTH_WRITE_DISABLED == 0
    }

    pub fn is_transparent(&self) -> bool {
        !matches!(self.blend, BlendMode::Opaque | BlendMode::AlphaKey)
    }

    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        blend_state(self.blend)
    }

    pub fn color_target(&self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: self.blend_state(),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }

    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if self.is_two_sided() { None } else { Some(wgpu::Face::Back) },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        }
    }

    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_write(),
            depth_compare: if self.depth_test() {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}
