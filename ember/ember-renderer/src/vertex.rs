//! Batch vertex layout shared with the geometry and full-screen vertex programs.

use bytemuck::{Pod, Zeroable};

/// 72-byte vertex. Attribute locations: 0 position, 1 normal, 2 tangent, 3 binormal, 4 texcoord, 5 color.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub binormal: [f32; 3],
    pub texcoord: [f32; 2],
    pub color: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 0.0, -1.0],
            tangent: [1.0, 0.0, 0.0],
            binormal: [0.0, 1.0, 0.0],
            texcoord: [0.0; 2],
            color: [1.0; 4],
        }
    }
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Decodes a tightly packed vertex stream (as uploaded to a vertex buffer).
    pub fn decode_all(bytes: &[u8]) -> Vec<Vertex> {
        bytes.chunks_exact(Self::STRIDE).map(bytemuck::pod_read_unaligned).collect()
    }
}

const fn quad_vertex(x: f32, y: f32, u: f32, v: f32) -> Vertex {
    Vertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, -1.0],
        tangent: [1.0, 0.0, 0.0],
        binormal: [0.0, 1.0, 0.0],
        texcoord: [u, v],
        color: [1.0; 4],
    }
}

/// Two clip-space triangles covering the viewport; texcoord (0, 0) at the top-left.
pub const FULL_SCREEN_QUAD: [Vertex; 6] = [
    quad_vertex(-1.0, 1.0, 0.0, 0.0),
    quad_vertex(1.0, 1.0, 1.0, 0.0),
    quad_vertex(-1.0, -1.0, 0.0, 1.0),
    quad_vertex(-1.0, -1.0, 0.0, 1.0),
    quad_vertex(1.0, 1.0, 1.0, 0.0),
    quad_vertex(1.0, -1.0, 1.0, 1.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_72_bytes() {
        assert_eq!(Vertex::STRIDE, 72);
        assert_eq!(std::mem::offset_of!(Vertex, texcoord), 48);
        assert_eq!(std::mem::offset_of!(Vertex, color), 56);
    }

    #[test]
    fn decode_reads_packed_stream() {
        let mut a = Vertex::default();
        a.position = [1.0, 2.0, 3.0];
        let b = Vertex { texcoord: [0.5, 0.25], ..Vertex::default() };
        let bytes = bytemuck::cast_slice(&[a, b]).to_vec();
        assert_eq!(Vertex::decode_all(&bytes), vec![a, b]);
    }
}
