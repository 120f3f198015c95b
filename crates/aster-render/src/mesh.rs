//! Mesh data and vertex buffer upload.

use crate::error::{RenderError, Result};
use aster_gpu::{DeviceAllocator, ReleaseAction, ReleaseLedger};
use ash::vk;

/// A single mesh vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    /// Vertex input binding for the mesh pipeline.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Vertex attribute layout: position at location 0, color at location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::offset_of!(Self, color) as u32),
        ]
    }
}

/// A triangle-list mesh and, once uploaded, its vertex buffer handle.
pub struct Mesh {
    vertices: Vec<Vertex>,
    buffer: Option<vk::Buffer>,
}

impl Mesh {
    /// Create a mesh from a flat triangle list.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            buffer: None,
        }
    }

    /// The hardcoded test triangle, colored green.
    pub fn triangle() -> Self {
        Self::new(vec![
            Vertex {
                position: [1.0, 1.0, 0.0],
                color: [0.0, 1.0, 0.0],
            },
            Vertex {
                position: [-1.0, 1.0, 0.0],
                color: [0.0, 1.0, 0.0],
            },
            Vertex {
                position: [0.0, -1.0, 0.0],
                color: [0.0, 1.0, 0.0],
            },
        ])
    }

    /// Upload the vertex data into a host-visible vertex buffer.
    ///
    /// The buffer's teardown is registered with the ledger by the allocator;
    /// the mesh keeps only the raw handle for binding. Uploading an empty
    /// mesh or uploading twice is an error.
    pub fn upload(
        &mut self,
        allocator: &mut DeviceAllocator,
        ledger: &mut ReleaseLedger<ReleaseAction>,
    ) -> Result<()> {
        self.preflight()?;

        let buffer = allocator.create_buffer_with_data(
            ledger,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            self.as_bytes(),
            "mesh vertex buffer",
        )?;

        self.buffer = Some(buffer);
        Ok(())
    }

    fn preflight(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(RenderError::EmptyMesh);
        }
        if self.buffer.is_some() {
            return Err(RenderError::AlreadyUploaded);
        }
        Ok(())
    }

    /// Raw vertex bytes as laid out on the GPU.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Number of vertices to draw.
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Whether the mesh holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The uploaded vertex buffer, if `upload` succeeded.
    pub fn buffer(&self) -> Option<vk::Buffer> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn vertex_layout_matches_the_mesh_shader() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);

        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].offset, 12);
        assert!(attributes
            .iter()
            .all(|a| a.format == vk::Format::R32G32B32_SFLOAT));
    }

    #[test]
    fn triangle_mesh_is_ready_to_upload() {
        let mesh = Mesh::triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert!(!mesh.is_empty());
        assert!(mesh.preflight().is_ok());
    }

    #[test]
    fn vertex_bytes_survive_a_round_trip() {
        let mesh = Mesh::triangle();
        let bytes = mesh.as_bytes();
        assert_eq!(bytes.len(), 3 * 24);

        let restored: &[Vertex] = bytemuck::cast_slice(bytes);
        assert_eq!(restored, mesh.vertices.as_slice());
    }

    #[test]
    fn empty_mesh_refuses_upload() {
        let mesh = Mesh::new(Vec::new());
        assert!(matches!(mesh.preflight(), Err(RenderError::EmptyMesh)));
    }

    #[test]
    fn second_upload_is_rejected() {
        let mut mesh = Mesh::triangle();
        mesh.buffer = Some(vk::Buffer::from_raw(0x1));
        assert!(matches!(
            mesh.preflight(),
            Err(RenderError::AlreadyUploaded)
        ));
    }
}
