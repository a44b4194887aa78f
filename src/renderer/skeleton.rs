use glam::{Mat4, Quat, Vec3};

use crate::{
    renderer::camera::Camera,
    resource_system::file_formats::modelspec::{BoneSpec, BONE_FLAG_SPHERICAL_BILLBOARD},
};

/// Animated local transform of one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}
impl Default for BonePose {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBone {
    pub parent: Option<usize>,
    pub pivot: Vec3,
    pub flags: u32,
}
impl LayoutBone {
    pub fn is_spherical_billboard(&self) -> bool {
        self.flags & BONE_FLAG_SPHERICAL_BILLBOARD != 0
    }
}

/// Bone hierarchy with a precomputed parent-before-child evaluation order.
#[derive(Debug, Clone, Default)]
pub struct SkeletonLayout {
    bones: Vec<LayoutBone>,
    order: Vec<usize>,
}
impl SkeletonLayout {
    pub fn new(specs: &[BoneSpec]) -> Self {
        let count = specs.len();
        let mut bones: Vec<LayoutBone> = specs
            .iter()
            .enumerate()
            .map(|(idx, bone)| {
                let parent = bone.parent.map(usize::from).filter(|p| {
                    let valid = *p < count && *p != idx;
                    if !valid {
                        log::warn!("bone {idx} has invalid parent {p}, treating it as a root");
                    }
                    valid
                });
                LayoutBone {
                    parent,
                    pivot: Vec3::from_array(bone.pivot),
                    flags: bone.flags,
                }
            })
            .collect();

        // walk up from every bone; a walk longer than the bone count is a cycle
        for idx in 0..count {
            let mut cursor = bones[idx].parent;
            let mut steps = 0;
            while let Some(p) = cursor {
                steps += 1;
                if steps > count {
                    log::warn!("bone {idx} is part of a parent cycle, treating it as a root");
                    bones[idx].parent = None;
                    break;
                }
                cursor = bones[p].parent;
            }
        }

        let mut children: Vec<Vec<usize>> = vec![vec![]; count];
        for (idx, bone) in bones.iter().enumerate() {
            if let Some(p) = bone.parent {
                children[p].push(idx);
            }
        }

        let mut order = Vec::with_capacity(count);
        let mut stack: Vec<usize> = (0..count).rev().filter(|i| bones[*i].parent.is_none()).collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(children[idx].iter().rev());
        }

        Self { bones, order }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[LayoutBone] {
        &self.bones
    }

    /// Bone indices, every parent ahead of its children.
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

/// Square RGBA32F texture holding one column-major matrix per four texels.
#[derive(Debug, Clone)]
pub struct BoneTexture {
    side: u32,
    data: Vec<f32>,
    needs_update: bool,
}
impl BoneTexture {
    pub fn side_for(bone_count: usize) -> u32 {
        let size = ((bone_count * 4) as f32).sqrt();
        let size = (size / 4.0).ceil() as u32 * 4;
        size.max(4)
    }

    pub fn new(bone_count: usize) -> Self {
        let side = Self::side_for(bone_count);
        Self {
            side,
            data: vec![0.0; (side * side * 4) as usize],
            needs_update: true,
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn matrix(&self, bone: usize) -> Mat4 {
        Mat4::from_cols_slice(&self.data[bone * 16..bone * 16 + 16])
    }

    fn write(&mut self, bone: usize, matrix: &Mat4) {
        self.data[bone * 16..bone * 16 + 16].copy_from_slice(&matrix.to_cols_array());
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Returns the dirty flag and clears it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.needs_update, false)
    }

    pub fn size(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.side,
            height: self.side,
            depth_or_array_layers: 1,
        }
    }

    pub fn descriptor(&self) -> wgpu::TextureDescriptor<'static> {
        wgpu::TextureDescriptor {
            label: Some("Bone texture"),
            size: self.size(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        }
    }

    pub fn create_texture(&self, device: &wgpu::Device) -> wgpu::Texture {
        device.create_texture(&self.descriptor())
    }

    /// Writes the texels if they changed since the last upload.
    pub fn upload(&mut self, queue: &wgpu::Queue, texture: &wgpu::Texture) {
        if !self.take_dirty() {
            return;
        }
        queue.write_texture(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            self.as_bytes(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.side * 4 * 4),
                rows_per_image: Some(self.side),
            },
            self.size(),
        );
    }
}

/// Per-consumer skeleton instance baking bone matrices into a [`BoneTexture`].
#[derive(Debug, Clone)]
pub struct ModelSkeleton {
    layout: std::rc::Rc<SkeletonLayout>,
    pub root: Mat4,
    model_view: Mat4,
    texture: BoneTexture,
    world: Vec<Mat4>,
}
impl ModelSkeleton {
    pub fn new(layout: std::rc::Rc<SkeletonLayout>) -> Self {
        let mut texture = BoneTexture::new(layout.len());
        for bone in 0..layout.len() {
            texture.write(bone, &Mat4::IDENTITY);
        }
        Self {
            world: vec![Mat4::IDENTITY; layout.len()],
            layout,
            root: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
            texture,
        }
    }

    pub fn layout(&self) -> &SkeletonLayout {
        &self.layout
    }

    pub fn model_view(&self) -> Mat4 {
        self.model_view
    }

    pub fn texture(&self) -> &BoneTexture {
        &self.texture
    }

    pub fn texture_mut(&mut self) -> &mut BoneTexture {
        &mut self.texture
    }

    pub fn bone_matrix(&self, bone: usize) -> Mat4 {
        self.world[bone]
    }

    /// Rebakes every bone for `camera`. Bones missing from `pose` use the rest pose.
    pub fn update_bones(&mut self, camera: &Camera, pose: &[BonePose]) {
        self.model_view = camera.view_matrix() * self.root;

        for &idx in self.layout.order() {
            let bone = self.layout.bones()[idx];
            let local_pose = pose.get(idx).copied().unwrap_or_default();
            let parent_world = bone.parent.map_or(Mat4::IDENTITY, |p| self.world[p]);

            let rotation = if bone.is_spherical_billboard() {
                // cancel the accumulated view rotation so the bone faces the camera
                let (_, view_rotation, _) = (self.model_view * parent_world).to_scale_rotation_translation();
                view_rotation.inverse()
            } else {
                local_pose.rotation
            };

            let local = Mat4::from_translation(bone.pivot)
                * Mat4::from_translation(local_pose.translation)
                * Mat4::from_quat(rotation)
                * Mat4::from_scale(local_pose.scale)
                * Mat4::from_translation(-bone.pivot);
            let world = parent_world * local;
            self.world[idx] = world;
            self.texture.write(idx, &world);
        }

        self.texture.needs_update = true;
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn bone(parent: Option<u16>, pivot: [f32; 3]) -> BoneSpec {
        BoneSpec {
            parent,
            pivot,
            ..Default::default()
        }
    }

    #[test]
    fn texture_side_follows_bone_count() {
        let sides: Vec<u32> = [0, 1, 4, 5, 16, 17].iter().map(|n| BoneTexture::side_for(*n)).collect();
        assert_eq!(sides, vec![4, 4, 4, 8, 8, 12]);

        let mut last = 0;
        for n in 0..300 {
            let side = BoneTexture::side_for(n);
            assert!(side >= last);
            assert_eq!(side % 4, 0);
            assert!((side * side) as usize >= n * 4);
            last = side;
        }
        assert_eq!(BoneTexture::new(17).data().len(), 12 * 12 * 4);
    }

    #[test]
    fn parents_are_ordered_before_children() {
        // 0 <- 2 <- 1, 3 root
        let layout = SkeletonLayout::new(&[
            bone(None, [0.0; 3]),
            bone(Some(2), [0.0; 3]),
            bone(Some(0), [0.0; 3]),
            bone(None, [0.0; 3]),
        ]);
        let order = layout.order();
        assert_eq!(order.len(), 4);
        let pos = |i: usize| order.iter().position(|o| *o == i).unwrap();
        assert!(pos(0) < pos(2));
        assert!(pos(2) < pos(1));
    }

    #[test]
    fn broken_parents_become_roots() {
        let layout = SkeletonLayout::new(&[
            bone(Some(1), [0.0; 3]),
            bone(Some(0), [0.0; 3]),
            bone(Some(9), [0.0; 3]),
            bone(Some(3), [0.0; 3]),
        ]);
        assert_eq!(layout.order().len(), 4);
        assert_eq!(layout.bones()[2].parent, None);
        assert_eq!(layout.bones()[3].parent, None);
        assert!(layout.bones()[0].parent.is_none() || layout.bones()[1].parent.is_none());
    }

    #[test]
    fn bind_pose_is_identity() {
        let layout = Rc::new(SkeletonLayout::new(&[bone(None, [1.0, 2.0, 3.0])]));
        let mut skeleton = ModelSkeleton::new(layout);
        assert_eq!(skeleton.texture().matrix(0), Mat4::IDENTITY);
        assert!(skeleton.texture_mut().take_dirty());
        assert!(!skeleton.texture().needs_update());

        skeleton.update_bones(&Camera::default(), &[]);
        assert_eq!(skeleton.texture().matrix(0), Mat4::IDENTITY);
        assert!(skeleton.texture().needs_update());
    }

    #[test]
    fn child_inherits_parent_transform_around_pivots() {
        let layout = Rc::new(SkeletonLayout::new(&[
            bone(None, [0.0, 0.0, 0.0]),
            bone(Some(0), [1.0, 0.0, 0.0]),
        ]));
        let mut skeleton = ModelSkeleton::new(layout);
        let pose = [
            BonePose {
                translation: Vec3::new(0.0, 0.0, 2.0),
                ..Default::default()
            },
            BonePose {
                rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
                ..Default::default()
            },
        ];
        skeleton.update_bones(&Camera::default(), &pose);

        // the pivot stays fixed under the child's own rotation, then follows the parent
        let pivot = skeleton.texture().matrix(1).transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((pivot - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-5);
        let tip = skeleton.texture().matrix(1).transform_point3(Vec3::new(2.0, 0.0, 0.0));
        assert!((tip - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn billboards_cancel_view_rotation() {
        let mut spec = bone(None, [0.0; 3]);
        spec.flags = BONE_FLAG_SPHERICAL_BILLBOARD;
        let mut skeleton = ModelSkeleton::new(Rc::new(SkeletonLayout::new(&[spec])));
        let camera = Camera::look_at(Vec3::new(5.0, 3.0, 2.0), Vec3::ZERO);
        skeleton.update_bones(&camera, &[BonePose::default()]);

        let (_, rotation, _) = (skeleton.model_view() * skeleton.bone_matrix(0)).to_scale_rotation_translation();
        assert!(rotation.angle_between(Quat::IDENTITY) < 1e-3);
    }
}
