use std::ops::Range;

use glam::{Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt as _;

use crate::{
    error::LoadError,
    resource_system::file_formats::modelspec::{Bounds, DrawGroup, GeometrySpec},
};

/// One interleaved vertex exactly as model files store it (48 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub bone_weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: [f32; 3],
    pub tex_coord_1: [f32; 2],
    pub tex_coord_2: [f32; 2],
}

impl ModelVertex {
    pub const STRIDE: usize = 48;

    pub const LOCATION_POSITION: u32 = 0;
    pub const LOCATION_BONE_WEIGHTS: u32 = 1;
    pub const LOCATION_BONE_INDICES: u32 = 2;
    pub const LOCATION_NORMAL: u32 = 3;
    pub const LOCATION_TEX_COORD_1: u32 = 4;
    pub const LOCATION_TEX_COORD_2: u32 = 5;

    const OFFSET_POS: wgpu::BufferAddress = 0;
    const OFFSET_WEI: wgpu::BufferAddress =
        Self::OFFSET_POS + std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
    const OFFSET_IDX: wgpu::BufferAddress =
        Self::OFFSET_WEI + std::mem::size_of::<[u8; 4]>() as wgpu::BufferAddress;
    const OFFSET_NOR: wgpu::BufferAddress =
        Self::OFFSET_IDX + std::mem::size_of::<[u8; 4]>() as wgpu::BufferAddress;
    const OFFSET_TC1: wgpu::BufferAddress =
        Self::OFFSET_NOR + std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
    const OFFSET_TC2: wgpu::BufferAddress =
        Self::OFFSET_TC1 + std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;

    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = [
        wgpu::VertexAttribute {
            offset: Self::OFFSET_POS,
            shader_location: Self::LOCATION_POSITION,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: Self::OFFSET_WEI,
            shader_location: Self::LOCATION_BONE_WEIGHTS,
            format: wgpu::VertexFormat::Unorm8x4,
        },
        wgpu::VertexAttribute {
            offset: Self::OFFSET_IDX,
            shader_location: Self::LOCATION_BONE_INDICES,
            format: wgpu::VertexFormat::Uint8x4,
        },
        wgpu::VertexAttribute {
            offset: Self::OFFSET_NOR,
            shader_location: Self::LOCATION_NORMAL,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: Self::OFFSET_TC1,
            shader_location: Self::LOCATION_TEX_COORD_1,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: Self::OFFSET_TC2,
            shader_location: Self::LOCATION_TEX_COORD_2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

pub struct GeometryBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// Static mesh data shared by every instance of a model.
#[derive(Debug)]
pub struct ModelGeometry {
    vertices: Vec<ModelVertex>,
    indices: Vec<u16>,
    groups: Vec<DrawGroup>,
    bounding_box: BoundingBox,
    bounding_sphere: BoundingSphere,
}
impl ModelGeometry {
    pub fn new(path: &str, spec: &GeometrySpec, bounds: &Bounds) -> Result<Self, LoadError> {
        if spec.vertex_buffer.len() % ModelVertex::STRIDE != 0 {
            return Err(LoadError::malformed(
                path,
                format!(
                    "vertex buffer of {} bytes is not a multiple of the {} byte stride",
                    spec.vertex_buffer.len(),
                    ModelVertex::STRIDE
                ),
            ));
        }
        if spec.index_buffer.len() % 2 != 0 {
            return Err(LoadError::malformed(
                path,
                format!("index buffer of {} bytes holds a partial u16", spec.index_buffer.len()),
            ));
        }

        let vertices: Vec<ModelVertex> = spec
            .vertex_buffer
            .chunks_exact(ModelVertex::STRIDE)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        let indices: Vec<u16> = spec
            .index_buffer
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        for group in &spec.groups {
            let end = group.start as u64 + group.count as u64;
            if end > indices.len() as u64 {
                return Err(LoadError::malformed(
                    path,
                    format!(
                        "draw group {}..{} exceeds {} indices",
                        group.start,
                        end,
                        indices.len()
                    ),
                ));
            }
        }

        let [min_x, min_y, min_z, max_x, max_y, max_z] = bounds.extent;
        Ok(Self {
            vertices,
            indices,
            groups: spec.groups.clone(),
            bounding_box: BoundingBox {
                min: Vec3::new(min_x, min_y, min_z),
                max: Vec3::new(max_x, max_y, max_z),
            },
            bounding_sphere: BoundingSphere {
                center: Vec3::from_array(bounds.center),
                radius: bounds.radius,
            },
        })
    }

    pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        ModelVertex::desc()
    }

    pub fn index_format() -> wgpu::IndexFormat {
        wgpu::IndexFormat::Uint16
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn groups(&self) -> &[DrawGroup] {
        &self.groups
    }

    pub fn group_range(&self, group: &DrawGroup) -> Range<u32> {
        group.start..group.start + group.count
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }

    pub fn position(&self, vertex: usize) -> Vec3 {
        Vec3::from_array(self.vertices[vertex].position)
    }

    /// Bone weights normalized to [0, 1], as the GPU sees them.
    pub fn bone_weights(&self, vertex: usize) -> Vec4 {
        let [x, y, z, w] = self.vertices[vertex].bone_weights;
        Vec4::new(x as f32, y as f32, z as f32, w as f32) / 255.0
    }

    pub fn bone_indices(&self, vertex: usize) -> [u8; 4] {
        self.vertices[vertex].bone_indices
    }

    pub fn normal(&self, vertex: usize) -> Vec3 {
        Vec3::from_array(self.vertices[vertex].normal)
    }

    pub fn tex_coord_1(&self, vertex: usize) -> Vec2 {
        Vec2::from_array(self.vertices[vertex].tex_coord_1)
    }

    pub fn tex_coord_2(&self, vertex: usize) -> Vec2 {
        Vec2::from_array(self.vertices[vertex].tex_coord_2)
    }

    pub fn create_buffers(&self, device: &wgpu::Device) -> GeometryBuffers {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model vertex buffer"),
            contents: self.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model index buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GeometryBuffers {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_f32s(bytes: &mut [u8], offset: usize, values: &[f32]) {
        for (i, v) in values.iter().enumerate() {
            bytes[offset + i * 4..offset + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    fn synthetic_vertex(seed: f32) -> [u8; 48] {
        let mut bytes = [0u8; 48];
        write_f32s(&mut bytes, 0, &[seed, seed + 1.0, seed + 2.0]);
        bytes[12..16].copy_from_slice(&[255, 128, 0, 51]);
        bytes[16..20].copy_from_slice(&[1, 2, 3, 200]);
        write_f32s(&mut bytes, 20, &[0.0, 0.0, 1.0]);
        write_f32s(&mut bytes, 32, &[0.25, 0.75]);
        write_f32s(&mut bytes, 40, &[seed * 0.5, 1.0 - seed * 0.5]);
        bytes
    }

    fn spec_with(vertices: &[[u8; 48]], indices: &[u16], groups: Vec<DrawGroup>) -> GeometrySpec {
        GeometrySpec {
            vertex_buffer: vertices.concat(),
            index_buffer: indices.iter().flat_map(|i| i.to_le_bytes()).collect(),
            groups,
        }
    }

    #[test]
    fn layout_matches_the_interleaved_file_format() {
        assert_eq!(std::mem::size_of::<ModelVertex>(), 48);
        assert_eq!(std::mem::offset_of!(ModelVertex, position), 0);
        assert_eq!(std::mem::offset_of!(ModelVertex, bone_weights), 12);
        assert_eq!(std::mem::offset_of!(ModelVertex, bone_indices), 16);
        assert_eq!(std::mem::offset_of!(ModelVertex, normal), 20);
        assert_eq!(std::mem::offset_of!(ModelVertex, tex_coord_1), 32);
        assert_eq!(std::mem::offset_of!(ModelVertex, tex_coord_2), 40);

        let layout = ModelGeometry::vertex_buffer_layout();
        assert_eq!(layout.array_stride, 48);
        let offsets: Vec<_> = layout.attributes.iter().map(|a| (a.offset, a.format)).collect();
        assert_eq!(
            offsets,
            vec![
                (0, wgpu::VertexFormat::Float32x3),
                (12, wgpu::VertexFormat::Unorm8x4),
                (16, wgpu::VertexFormat::Uint8x4),
                (20, wgpu::VertexFormat::Float32x3),
                (32, wgpu::VertexFormat::Float32x2),
                (40, wgpu::VertexFormat::Float32x2),
            ]
        );
    }

    #[test]
    fn attributes_decode_from_known_offsets() {
        let spec = spec_with(
            &[synthetic_vertex(1.0), synthetic_vertex(4.0)],
            &[0, 1, 1, 0, 1, 0],
            vec![DrawGroup { start: 0, count: 6, material_index: 0 }],
        );
        let geometry = ModelGeometry::new("test", &spec, &Bounds::default()).unwrap();

        assert_eq!(geometry.vertex_count(), 2);
        assert_eq!(geometry.position(1), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(geometry.bone_weights(0), Vec4::new(1.0, 128.0 / 255.0, 0.0, 0.2));
        assert_eq!(geometry.bone_indices(0), [1, 2, 3, 200]);
        assert_eq!(geometry.normal(0), Vec3::Z);
        assert_eq!(geometry.tex_coord_1(1), Vec2::new(0.25, 0.75));
        assert_eq!(geometry.tex_coord_2(1), Vec2::new(2.0, -1.0));
        assert_eq!(geometry.indices(), &[0, 1, 1, 0, 1, 0]);
        assert_eq!(geometry.vertex_bytes(), spec.vertex_buffer.as_slice());
    }

    #[test]
    fn bounds_come_from_the_spec() {
        let spec = spec_with(&[synthetic_vertex(100.0)], &[0], vec![]);
        let bounds = Bounds {
            extent: [-1.0, -2.0, -3.0, 1.0, 2.0, 3.0],
            center: [0.0, 0.0, 0.5],
            radius: 4.0,
        };
        let geometry = ModelGeometry::new("test", &spec, &bounds).unwrap();
        assert_eq!(geometry.bounding_box().min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(geometry.bounding_box().max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(geometry.bounding_sphere().center, Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(geometry.bounding_sphere().radius, 4.0);
    }

    #[test]
    fn draw_groups_select_index_ranges() {
        let spec = spec_with(
            &[synthetic_vertex(0.0)],
            &[0, 0, 0, 0, 0, 0],
            vec![
                DrawGroup { start: 0, count: 3, material_index: 1 },
                DrawGroup { start: 3, count: 3, material_index: 0 },
            ],
        );
        let geometry = ModelGeometry::new("test", &spec, &Bounds::default()).unwrap();
        let ranges: Vec<_> = geometry.groups().iter().map(|g| (geometry.group_range(g), g.material_index)).collect();
        assert_eq!(ranges, vec![(0..3, 1), (3..6, 0)]);
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        let mut spec = spec_with(&[synthetic_vertex(0.0)], &[0], vec![]);
        spec.vertex_buffer.pop();
        assert!(matches!(
            ModelGeometry::new("bad", &spec, &Bounds::default()),
            Err(LoadError::Malformed { .. })
        ));

        let mut spec = spec_with(&[synthetic_vertex(0.0)], &[0], vec![]);
        spec.index_buffer.push(7);
        assert!(ModelGeometry::new("bad", &spec, &Bounds::default()).is_err());

        let spec = spec_with(
            &[synthetic_vertex(0.0)],
            &[0, 0, 0],
            vec![DrawGroup { start: 2, count: 3, material_index: 0 }],
        );
        assert!(ModelGeometry::new("bad", &spec, &Bounds::default()).is_err());
    }
}
