use glam::{Mat4, Vec3};

use crate::resource_system::file_formats::modelspec::CameraSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// vertical field of view in degrees
    pub fov: f32,
    /// field of view as stored in the model, radians across the diagonal
    pub base_fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub up: Vec3,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 45.0,
            base_fov: 45f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            up: Vec3::Z,
            position: Vec3::new(0.0, -10.0, 0.0),
            target: Vec3::ZERO,
        }
    }
}

impl Camera {
    /// Builds the camera a model file ships with. The stored diagonal field of
    /// view is converted to a vertical one for `aspect`.
    pub fn from_spec(spec: &CameraSpec, aspect: f32) -> Self {
        let fov = (spec.field_of_view / (1.0 + aspect * aspect).sqrt()).to_degrees();
        Self {
            fov,
            base_fov: spec.field_of_view,
            aspect,
            near: spec.near_clip,
            far: spec.far_clip,
            up: Vec3::Z,
            position: Vec3::from_array(spec.position_base),
            target: Vec3::from_array(spec.target_base),
        }
    }

    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
