//! Render pass sequencer. Entering the current pass is a no-op; otherwise the pass's targets,
//! programs, inputs and fixed state are bound.

use render_api::{RenderTarget, MAX_SHADER_RESOURCES};

use crate::device::Device;
use crate::error::EmberResult;
use crate::resources::{LIGHT_SLOT, OBJECT_SLOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// G-Buffer fill (plus unlit output into the accumulation target).
    Geometry,
    /// Full-screen ambient lighting into the accumulation target.
    Ambient,
    /// Full-screen point lights into the accumulation target.
    Omni,
    /// Reserved: accepted, binds nothing.
    Spot,
    /// Full-screen composition; each stage binds its own targets and programs.
    PostProcess,
}

impl Pass {
    pub fn is_lighting(self) -> bool {
        matches!(self, Pass::Ambient | Pass::Omni)
    }
}

impl Device {
    pub(crate) fn enter_pass(&mut self, pass: Pass) -> EmberResult<()> {
        if self.pass == Some(pass) {
            return Ok(());
        }
        log::debug!("pass {:?} -> {:?}", self.pass, pass);
        self.pass = Some(pass);
        if pass == Pass::Spot {
            return Ok(());
        }

        // inputs first so no target is still bound for reading
        self.gpu.bind_shader_resources(0, &[None; MAX_SHADER_RESOURCES]);
        let targets = &self.resources.targets;
        match pass {
            Pass::Geometry => {
                let colors = [
                    RenderTarget::Texture(targets.diffuse),
                    RenderTarget::Texture(targets.depth),
                    RenderTarget::Texture(targets.normal),
                    RenderTarget::Texture(targets.material),
                    RenderTarget::Texture(targets.accumulation),
                ];
                self.gpu.bind_render_targets(&colors, true);
                self.gpu.set_viewport(self.viewport);
                self.state.resolve(self.gpu.as_mut(), &self.resources.programs)?;
            }
            Pass::Ambient | Pass::Omni => {
                let gbuffer = targets.gbuffer().map(Some);
                self.gpu.bind_render_targets(&[RenderTarget::Texture(targets.accumulation)], false);
                let programs = &self.resources.programs;
                let pixel = if pass == Pass::Ambient { programs.ambient_ps } else { programs.omni_ps };
                self.gpu.bind_programs(programs.full_screen_vs, pixel);
                self.gpu.bind_shader_resources(0, &gbuffer);
                let states = self.resources.states;
                for id in [states.additive, states.no_depth, states.full_screen, states.point_clamp] {
                    self.gpu.bind_state(id);
                }
                self.state.invalidate_bound();
                self.gpu.set_viewport(self.viewport);
                self.gpu.bind_constant_buffer(OBJECT_SLOT, self.resources.object_cb);
                self.gpu.bind_constant_buffer(LIGHT_SLOT, self.resources.light_cb);
            }
            Pass::PostProcess => {
                self.state.invalidate_bound();
                self.gpu.set_viewport(self.viewport);
            }
            Pass::Spot => {}
        }
        Ok(())
    }
}
