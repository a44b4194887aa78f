use std::{cell::RefCell, rc::Rc};

use glam::Mat4;

use crate::{
    renderer::{
        camera::Camera,
        geometry::ModelGeometry,
        material::ModelMaterial,
        skeleton::{ModelSkeleton, SkeletonLayout},
    },
    resource_system::file_formats::modelspec::DrawGroup,
    sim::animator::ModelAnimator,
};

/// A renderable model instance: shared geometry and animator, per-instance
/// materials and skeleton.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub geometry: Rc<ModelGeometry>,
    pub materials: Vec<ModelMaterial>,
    pub animator: Option<Rc<RefCell<ModelAnimator>>>,
    pub skinned: bool,
    pub skeleton: Option<Rc<RefCell<ModelSkeleton>>>,
    pub world_matrix: Mat4,
}

impl Model {
    pub fn new(
        name: String,
        geometry: Rc<ModelGeometry>,
        materials: Vec<ModelMaterial>,
        animator: Option<Rc<RefCell<ModelAnimator>>>,
        skeleton_layout: Option<Rc<SkeletonLayout>>,
        skinned: bool,
    ) -> Self {
        let skeleton = skeleton_layout
            .filter(|_| skinned)
            .map(|layout| Rc::new(RefCell::new(ModelSkeleton::new(layout))));
        if let (Some(animator), Some(skeleton)) = (&animator, &skeleton) {
            animator.borrow_mut().attach_skeleton(skeleton);
        }
        Self {
            name,
            geometry,
            materials,
            animator,
            skinned,
            skeleton,
            world_matrix: Mat4::IDENTITY,
        }
    }

    /// Pushes the world matrix into the skeleton root used by the next rebake.
    pub fn set_world_matrix(&mut self, world: Mat4) {
        self.world_matrix = world;
        if let Some(skeleton) = &self.skeleton {
            skeleton.borrow_mut().root = world;
        }
    }

    /// Copies the shared animator's latest values into this instance's materials.
    pub fn prepare_materials(&mut self) {
        let Some(animator) = &self.animator else {
            return;
        };
        let animator = animator.borrow();
        for material in &mut self.materials {
            material.prepare(animator.state());
        }
    }

    /// Refreshes every material's transforms for drawing through `camera`.
    pub fn prepare_view(&mut self, camera: &Camera) {
        for material in &mut self.materials {
            material.set_camera(camera, self.world_matrix);
        }
    }

    pub fn draw_groups(&self) -> impl Iterator<Item = (&DrawGroup, Option<&ModelMaterial>)> {
        self.geometry
            .groups()
            .iter()
            .map(|group| (group, self.materials.get(group.material_index as usize)))
    }

    pub fn skeleton(&self) -> Option<&Rc<RefCell<ModelSkeleton>>> {
        self.skeleton.as_ref()
    }
}
