//! GPU buffers for the face mesh.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::mesh::{project, FaceTopology, LandmarkFrame};

/// GPU vertex position (x, y in destination pixels, z fixed at 0 — the
/// mesh is always planar at the working depth).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    /// Position in pixels, z = 0.
    pub position: [f32; 3],
}

impl PositionVertex {
    /// Vertex buffer layout for wgpu.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PositionVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

/// GPU vertex UV coordinate. Populated once from the topology; texture
/// row 0 is the top, matching the projector's downward-growing y.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct UvVertex {
    /// UV in [0,1]².
    pub uv: [f32; 2],
}

impl UvVertex {
    /// Vertex buffer layout for wgpu.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<UvVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

/// Project a landmark frame into position-buffer contents.
///
/// Pure CPU staging: `position[i] == project(landmark_i, W, H, mirror)`
/// with z fixed at 0. This is the only per-frame geometry mutation on the
/// GPU path.
pub fn stage_positions(
    landmarks: &LandmarkFrame,
    width: f32,
    height: f32,
    mirror: bool,
) -> Vec<PositionVertex> {
    landmarks
        .points()
        .iter()
        .map(|&p| {
            let px = project(p, width as f64, height as f64, mirror);
            PositionVertex {
                position: [px.x as f32, px.y as f32, 0.0],
            }
        })
        .collect()
}

/// The one static indexed geometry shared by the wireframe and textured
/// layers.
///
/// Positions are mutable (`COPY_DST`) and rewritten per frame; the UV
/// buffer, the triangle index buffer, and the companion line-list edge
/// index buffer are immutable after construction.
pub struct FaceMeshGpu {
    /// Mutable per-frame vertex positions.
    pub position_buffer: wgpu::Buffer,
    /// Static UV coordinates.
    pub uv_buffer: wgpu::Buffer,
    /// Static triangle indices for the textured layer.
    pub triangle_index_buffer: wgpu::Buffer,
    /// Static deduplicated edge indices (line list) for the wireframe.
    pub edge_index_buffer: wgpu::Buffer,
    /// Number of triangle indices.
    pub num_triangle_indices: u32,
    /// Number of edge indices.
    pub num_edge_indices: u32,
    /// Number of vertices.
    pub num_vertices: u32,
}

impl FaceMeshGpu {
    /// Build the geometry once from a topology. Positions start zeroed
    /// and are filled by the first frame's upload.
    pub fn new(device: &wgpu::Device, topology: &FaceTopology) -> Self {
        let num_vertices = topology.num_vertices();

        let positions = vec![
            PositionVertex {
                position: [0.0; 3]
            };
            num_vertices
        ];
        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Face Position Buffer"),
            contents: bytemuck::cast_slice(&positions),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let uvs: Vec<UvVertex> = topology
            .uvs()
            .iter()
            .map(|p| UvVertex {
                uv: [p.x as f32, p.y as f32],
            })
            .collect();
        let uv_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Face UV Buffer"),
            contents: bytemuck::cast_slice(&uvs),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let triangle_indices: Vec<u32> = topology
            .triangles()
            .iter()
            .flat_map(|tri| tri.iter().map(|&v| v as u32))
            .collect();
        let triangle_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Face Triangle Index Buffer"),
            contents: bytemuck::cast_slice(&triangle_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let edge_indices: Vec<u32> = topology
            .edges()
            .iter()
            .flat_map(|e| e.iter().map(|&v| v as u32))
            .collect();
        let edge_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Face Edge Index Buffer"),
            contents: bytemuck::cast_slice(&edge_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            position_buffer,
            uv_buffer,
            triangle_index_buffer,
            edge_index_buffer,
            num_triangle_indices: triangle_indices.len() as u32,
            num_edge_indices: edge_indices.len() as u32,
            num_vertices: num_vertices as u32,
        }
    }

    /// Upload freshly staged positions, marking the buffer for re-upload.
    pub fn write_positions(&self, queue: &wgpu::Queue, staged: &[PositionVertex]) {
        queue.write_buffer(&self.position_buffer, 0, bytemuck::cast_slice(staged));
    }
}
