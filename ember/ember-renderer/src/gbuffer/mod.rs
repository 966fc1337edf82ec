//! Geometry pass draw: uploads a flushed batch into the smallest vertex bucket, writes the object
//! constants, binds material textures and resolves the state stack before one non-indexed draw.
//!
//! The geometry pass writes 4 G-Buffer targets (diffuse, depth, normal, material) plus the
//! accumulation target, which receives the emissive / unlit term directly.

use bytemuck::{Pod, Zeroable};
use render_api::{GpuError, PrimitiveTopology};

use crate::batch::tangent;
use crate::device::Device;
use crate::error::EmberResult;
use crate::math::{inverse, multiply};
use crate::resources::OBJECT_SLOT;
use crate::state::Capabilities;
use crate::vertex::Vertex;

/// `ObjectUniform::flags`: shade with the lighting passes instead of writing color unlit.
pub const OBJECT_FLAG_LIGHTING: u32 = 1 << 0;

/// Per-draw constants (slot 0). Matrices are uploaded as stored (row-major, row vectors).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [f32; 16],
    pub view: [f32; 16],
    pub proj: [f32; 16],
    pub inv_view_proj: [f32; 16],
    pub alpha_ref: f32,
    pub flags: u32,
    pub _pad: [f32; 2],
}

impl Device {
    pub(crate) fn object_uniform(&self) -> ObjectUniform {
        let view_proj = multiply(&self.view, &self.proj);
        let mut flags = 0;
        if self.state.is_enabled(Capabilities::LIGHTING) {
            flags |= OBJECT_FLAG_LIGHTING;
        }
        ObjectUniform {
            model: self.model.top().m,
            view: self.view.m,
            proj: self.proj.m,
            inv_view_proj: inverse(&view_proj).m,
            alpha_ref: self.state.top().alpha_ref,
            flags,
            _pad: [0.0; 2],
        }
    }

    pub(crate) fn write_object_constants(&mut self) -> EmberResult<()> {
        let uniform = self.object_uniform();
        self.gpu.write_buffer(self.resources.object_cb, bytemuck::bytes_of(&uniform))?;
        self.gpu.bind_constant_buffer(OBJECT_SLOT, self.resources.object_cb);
        Ok(())
    }

    /// One geometry draw of `vertices` (already expanded to `topology`).
    pub(crate) fn draw_batch(&mut self, vertices: &mut [Vertex], topology: PrimitiveTopology) -> EmberResult<()> {
        if vertices.is_empty() {
            return Ok(());
        }
        let triangles = matches!(topology, PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip);
        if triangles && self.state.is_enabled(Capabilities::GENERATE_TANGENT_BINORMAL) {
            tangent::generate(vertices, topology == PrimitiveTopology::TriangleStrip);
        }
        let bucket = self.resources.bucket_for(vertices.len()).ok_or_else(|| {
            GpuError::Draw(format!("{} vertices exceed the largest vertex bucket", vertices.len()))
        })?;
        self.gpu.write_buffer(bucket.buffer, bytemuck::cast_slice(vertices))?;
        self.write_object_constants()?;

        let defaults = self.resources.defaults;
        let textures = [
            Some(self.texture_or(self.material.diffuse, defaults.diffuse)),
            Some(self.texture_or(self.material.normal, defaults.normal)),
            Some(self.texture_or(self.material.material, defaults.material)),
        ];
        self.gpu.bind_shader_resources(0, &textures);
        self.state.resolve(self.gpu.as_mut(), &self.resources.programs)?;

        self.gpu.bind_vertex_buffer(bucket.buffer);
        self.gpu.set_topology(topology);
        self.gpu.draw(vertices.len() as u32, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_uniform_is_272_bytes() {
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 272);
    }
}
