//! Per-triangle tangent / binormal generation from positions and texture coordinates.

use crate::math::{scale3, sub, Vec3};
use crate::vertex::Vertex;

/// Below this texture-space determinant the basis is scaled by 1 instead of 1/det.
pub const DEGENERATE_DET: f32 = 1e-4;

/// Tangent and binormal of one triangle (not normalized).
pub fn triangle_basis(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> (Vec3, Vec3) {
    let e1 = sub(v1.position, v0.position);
    let e2 = sub(v2.position, v0.position);
    let (du1, dv1) = (v1.texcoord[0] - v0.texcoord[0], v1.texcoord[1] - v0.texcoord[1]);
    let (du2, dv2) = (v2.texcoord[0] - v0.texcoord[0], v2.texcoord[1] - v0.texcoord[1]);
    let det = du1 * dv2 - du2 * dv1;
    let r = if det.abs() <= DEGENERATE_DET { 1.0 } else { 1.0 / det };
    let tangent = scale3(sub(scale3(e1, dv2), scale3(e2, dv1)), r);
    let binormal = scale3(sub(scale3(e2, du1), scale3(e1, du2)), r);
    (tangent, binormal)
}

/// Writes each triangle's basis to its three vertices. Triangle lists step by 3, strips by 2.
pub fn generate(vertices: &mut [Vertex], strip: bool) {
    let step = if strip { 2 } else { 3 };
    let mut i = 0;
    while i + 2 < vertices.len() {
        let (tangent, binormal) = triangle_basis(&vertices[i], &vertices[i + 1], &vertices[i + 2]);
        for v in &mut vertices[i..i + 3] {
            v.tangent = tangent;
            v.binormal = binormal;
        }
        i += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vert(p: [f32; 3], uv: [f32; 2]) -> Vertex {
        Vertex { position: p, texcoord: uv, ..Vertex::default() }
    }

    #[test]
    fn axis_aligned_triangle_gives_axis_basis() {
        let mut tri = [
            vert([0.0, 0.0, 0.0], [0.0, 0.0]),
            vert([2.0, 0.0, 0.0], [1.0, 0.0]),
            vert([0.0, 2.0, 0.0], [0.0, 1.0]),
        ];
        generate(&mut tri, false);
        for v in &tri {
            assert_eq!(v.tangent, [2.0, 0.0, 0.0]);
            assert_eq!(v.binormal, [0.0, 2.0, 0.0]);
        }
    }

    #[test]
    fn degenerate_uvs_use_unit_scale() {
        let a = vert([0.0, 0.0, 0.0], [0.0, 0.0]);
        let b = vert([1.0, 0.0, 0.0], [0.5, 0.5]);
        let c = vert([0.0, 1.0, 0.0], [1.0, 1.0]);
        let (t, bn) = triangle_basis(&a, &b, &c);
        // det = 0.5 * 1 - 1 * 0.5 = 0; r = 1
        assert_eq!(t, [1.0, -0.5, 0.0]);
        assert_eq!(bn, [-1.0, 0.5, 0.0]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let a = vert([0.0, 0.0, 0.0], [0.0, 0.0]);
        let b = vert([1.0, 0.0, 0.0], [0.0001, 0.0]);
        let c = vert([0.0, 1.0, 0.0], [0.0, 1.0]);
        // det = 1e-4 exactly in f32 arithmetic of 0.0001 * 1.0
        let (t, _) = triangle_basis(&a, &b, &c);
        assert_eq!(t, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn strip_steps_by_two() {
        let mut strip: Vec<Vertex> = (0..5).map(|i| vert([i as f32, (i % 2) as f32, 0.0], [i as f32, 0.0])).collect();
        strip[4].texcoord = [0.0, 1.0];
        generate(&mut strip, true);
        // triangles (0,1,2) and (2,3,4): vertex 3 only belongs to the second
        let (t, _) = triangle_basis(&strip[2], &strip[3], &strip[4]);
        assert_eq!(strip[3].tangent, t);
        assert_eq!(strip[2].tangent, t);
    }

    #[test]
    fn partial_triangle_is_ignored() {
        let mut verts = [Vertex::default(); 2];
        generate(&mut verts, false);
        assert_eq!(verts[0].tangent, Vertex::default().tangent);
    }
}
