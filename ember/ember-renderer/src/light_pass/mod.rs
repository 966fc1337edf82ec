//! Light pass: full-screen ambient and point (omni) lights accumulated additively.
//! Lights are not batched; each submitted light position draws one full-screen quad.

use bytemuck::{Pod, Zeroable};
use render_api::PrimitiveTopology;

use crate::device::Device;
use crate::error::EmberResult;
use crate::math::{transform_point, Vec3};
use crate::resources::LIGHT_SLOT;
use crate::vertex::FULL_SCREEN_QUAD;

/// One light as seen by the lighting programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDescriptor {
    /// World-space position (the model matrix already applied).
    pub position: Vec3,
    pub radius: f32,
    pub multiplier: f32,
    pub color: [f32; 3],
}

/// Light constants (slot 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    pub multiplier: f32,
}

impl From<LightDescriptor> for LightUniform {
    fn from(light: LightDescriptor) -> Self {
        Self { position: light.position, radius: light.radius, color: light.color, multiplier: light.multiplier }
    }
}

impl Device {
    fn current_light(&self, position: Vec3) -> LightDescriptor {
        let c = self.attrs.vertex.color;
        LightDescriptor {
            position,
            radius: self.attrs.radius,
            multiplier: self.attrs.multiplier,
            color: [c[0], c[1], c[2]],
        }
    }

    /// Ambient term: current color times multiplier over the whole viewport.
    pub(crate) fn draw_ambient(&mut self) -> EmberResult<()> {
        let light = self.current_light([0.0; 3]);
        self.draw_light(light.into())
    }

    /// Point light at `position` (object space, transformed by the model matrix).
    pub(crate) fn draw_omni(&mut self, position: Vec3) -> EmberResult<()> {
        let world = transform_point(self.model.top(), position);
        let light = self.current_light(world);
        self.draw_light(light.into())
    }

    fn draw_light(&mut self, uniform: LightUniform) -> EmberResult<()> {
        self.write_object_constants()?;
        self.gpu.write_buffer(self.resources.light_cb, bytemuck::bytes_of(&uniform))?;
        self.gpu.bind_constant_buffer(LIGHT_SLOT, self.resources.light_cb);
        self.gpu.bind_vertex_buffer(self.resources.quad);
        self.gpu.set_topology(PrimitiveTopology::TriangleList);
        self.gpu.draw(FULL_SCREEN_QUAD.len() as u32, 0)?;
        Ok(())
    }
}
