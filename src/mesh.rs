// Quad geometry and its vertex layout

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

/// Index type used by the index buffer (matches `vk::IndexType::UINT16`)
pub type Index = u16;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(pos: [f32; 2], color: [f32; 3]) -> Self {
        Self { pos, color }
    }

    /// One interleaved binding at slot 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// location 0: position (vec2), location 1: color (vec3)
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Self, pos) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Self, color) as u32,
            },
        ]
    }
}

/// Indexed triangle list
pub struct Mesh {
    pub vertices: &'static [Vertex],
    pub indices: &'static [Index],
}

pub const QUAD: Mesh = Mesh {
    vertices: &[
        Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
        Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
        Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
        Vertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
    ],
    indices: &[0, 1, 2, 2, 3, 0],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_shader_inputs() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 20);

        let [pos, color] = Vertex::attribute_descriptions();
        assert_eq!((pos.location, pos.offset, pos.format), (0, 0, vk::Format::R32G32_SFLOAT));
        assert_eq!((color.location, color.offset, color.format), (1, 8, vk::Format::R32G32B32_SFLOAT));
    }

    #[test]
    fn quad_indices_form_two_triangles_in_range() {
        assert_eq!(QUAD.indices.len() % 3, 0);
        assert_eq!(QUAD.indices.len() / 3, 2);
        assert!(QUAD.indices.iter().all(|&i| (i as usize) < QUAD.vertices.len()));
    }

    #[test]
    fn vertices_cast_to_tightly_packed_bytes() {
        let bytes: &[u8] = bytemuck::cast_slice(QUAD.vertices);
        assert_eq!(bytes.len(), QUAD.vertices.len() * 20);
    }
}
