use glam::{Vec2, Vec3};

/// Scene lighting snapshot handed to materials, split into the stage uniform blocks.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    pub sun_dir: [f32; 3],
    pub _pad0: f32,
    pub sun_diffuse: [f32; 3],
    pub _pad1: f32,
    pub sun_ambient: [f32; 3],
    pub _pad2: f32,
    pub fog_color: [f32; 3],
    pub _pad3: f32,
    /// fog start and end distance
    pub fog_params: [f32; 2],
    pub _pad4: [f32; 2],
}

impl Default for LightUniforms {
    fn default() -> Self {
        SceneLight::default().uniforms()
    }
}

pub trait LightingProvider {
    fn uniforms(&self) -> LightUniforms;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    pub direction: Vec3,
    pub diffuse: Vec3,
    pub ambient: Vec3,
    pub fog_color: Vec3,
    pub fog_range: Vec2,
}

impl Default for SceneLight {
    fn default() -> Self {
        SceneLight {
            direction: Vec3::new(1.0, -1.0, -1.0).normalize(),
            diffuse: Vec3::splat(1.0),
            ambient: Vec3::splat(0.5),
            fog_color: Vec3::splat(0.25),
            fog_range: Vec2::new(100.0, 400.0),
        }
    }
}

impl LightingProvider for SceneLight {
    fn uniforms(&self) -> LightUniforms {
        LightUniforms {
            sun_dir: self.direction.normalize_or_zero().to_array(),
            _pad0: 0.0,
            sun_diffuse: self.diffuse.to_array(),
            _pad1: 0.0,
            sun_ambient: self.ambient.to_array(),
            _pad2: 0.0,
            fog_color: self.fog_color.to_array(),
            _pad3: 0.0,
            fog_params: self.fog_range.to_array(),
            _pad4: [0.0; 2],
        }
    }
}
