//! Post-process pipeline: bloom extraction, blur cascade, HDR tone mapping and the final composite
//! onto the back buffer, as a sequence of full-screen quad draws between render targets.
//!
//! Capability bits are captured once per `post_process` call. The first call in a frame overwrites
//! the back buffer; later calls in the same frame composite additively.

use bytemuck::{Pod, Zeroable};
use render_api::{PrimitiveTopology, ProgramId, RenderTarget, StateId, TextureId, Viewport, MAX_SHADER_RESOURCES};

use crate::device::Device;
use crate::error::{EmberError, EmberResult};
use crate::pass::Pass;
use crate::resources::POST_SLOT;
use crate::state::Capabilities;
use crate::vertex::FULL_SCREEN_QUAD;

/// Taps on each side of the center in the separable Gaussian.
pub const BLUR_RADIUS: usize = 8;
/// Spread at or below which no further downsampling is done.
pub const MAX_LEVEL_SPREAD: f32 = 8.0;
/// Deepest blur level the cascade steps to.
pub const MAX_BLUR_LEVEL: usize = 7;
/// Spread used when blurring the bloom source.
pub const BLOOM_SPREAD: f32 = 16.0;
const GAUSSIAN_SIGMA: f32 = 3.0;

/// `PostUniform::flags`: darken the borders of back-buffer composites.
pub const POST_FLAG_VIGNETTE: u32 = 1 << 0;

/// Post constants (slot 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PostUniform {
    /// Offset between blur taps, in source UV units.
    pub texel_step: [f32; 2],
    /// Source UV extent covered by content.
    pub uv_max: [f32; 2],
    /// Center weight followed by the 8 one-sided weights, padded to 12.
    pub weights: [[f32; 4]; 3],
    pub flags: u32,
    pub _pad: [u32; 3],
}

impl PostUniform {
    fn sample(uv_max: [f32; 2], flags: u32) -> Self {
        Self { texel_step: [0.0; 2], uv_max, weights: [[0.0; 4]; 3], flags, _pad: [0; 3] }
    }
}

/// Normalized 17-tap Gaussian: `w[0]` center, `w[k]` for offsets `±k`.
pub fn gaussian_weights() -> [f32; BLUR_RADIUS + 1] {
    let mut w = [0.0f32; BLUR_RADIUS + 1];
    for (k, weight) in w.iter_mut().enumerate() {
        let x = k as f32;
        *weight = (-(x * x) / (2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA)).exp();
    }
    let total: f32 = w[0] + 2.0 * w[1..].iter().sum::<f32>();
    for weight in &mut w {
        *weight /= total;
    }
    w
}

fn packed_weights() -> [[f32; 4]; 3] {
    let w = gaussian_weights();
    let mut packed = [[0.0; 4]; 3];
    for (i, value) in w.iter().enumerate() {
        packed[i / 4][i % 4] = *value;
    }
    packed
}

/// Blur level for `spread` starting at `start`: halve while above 8, at most down to level 7 and
/// below `levels`. Returns the level and the remaining spread.
pub fn choose_level(start: usize, spread: f32, levels: usize) -> (usize, f32) {
    let mut level = start;
    let mut spread = spread;
    let last = MAX_BLUR_LEVEL.min(levels.saturating_sub(1));
    while spread > MAX_LEVEL_SPREAD && level < last {
        spread *= 0.5;
        level += 1;
    }
    (level, spread)
}

/// Capability bits captured at the start of a `post_process` call.
#[derive(Debug, Clone, Copy)]
struct PostStages {
    bloom: bool,
    hdr: bool,
    blur: bool,
    spread: f32,
    vignette: u32,
}

/// One full-screen quad draw.
struct Composite {
    target: RenderTarget,
    size: (u32, u32),
    sources: [Option<TextureId>; 2],
    pixel: ProgramId,
    blend: StateId,
    sampler: StateId,
    uniform: PostUniform,
}

impl Device {
    fn composite(&mut self, c: Composite) -> EmberResult<()> {
        let r = &self.resources;
        self.gpu.bind_shader_resources(0, &[None; MAX_SHADER_RESOURCES]);
        self.gpu.bind_render_targets(&[c.target], false);
        self.gpu.set_viewport(Viewport::new(0.0, 0.0, c.size.0 as f32, c.size.1 as f32));
        self.gpu.bind_programs(r.programs.full_screen_vs, c.pixel);
        for id in [c.blend, r.states.no_depth, r.states.full_screen, c.sampler] {
            self.gpu.bind_state(id);
        }
        self.gpu.write_buffer(r.post_cb, bytemuck::bytes_of(&c.uniform))?;
        self.gpu.bind_constant_buffer(POST_SLOT, r.post_cb);
        self.gpu.bind_shader_resources(0, &c.sources);
        self.gpu.bind_vertex_buffer(r.quad);
        self.gpu.set_topology(PrimitiveTopology::TriangleList);
        self.gpu.draw(FULL_SCREEN_QUAD.len() as u32, 0)?;
        Ok(())
    }

    /// Downsamples from `start` to the level chosen for `spread`, then blurs that level in place.
    /// Returns the level holding the result.
    pub(crate) fn blur_cascade(&mut self, start: usize, spread: f32) -> EmberResult<usize> {
        let levels = self.resources.targets.blur.len();
        let start = start.min(levels - 1);
        let (level, spread) = choose_level(start, spread, levels);
        let (pass_through, blur_h, blur_v) = {
            let p = &self.resources.programs;
            (p.pass_through_ps, p.blur_h_ps, p.blur_v_ps)
        };
        let states = self.resources.states;

        for i in start..level {
            let (src, dst) = (self.resources.targets.blur[i], self.resources.targets.blur[i + 1]);
            self.composite(Composite {
                target: RenderTarget::Texture(dst.primary),
                size: (dst.content_width, dst.content_height),
                sources: [Some(src.primary), None],
                pixel: pass_through,
                blend: states.opaque,
                sampler: states.point_clamp,
                uniform: PostUniform::sample(src.uv_max(), 0),
            })?;
        }

        let lvl = self.resources.targets.blur[level];
        let taps = spread / MAX_LEVEL_SPREAD;
        let mut uniform = PostUniform::sample(lvl.uv_max(), 0);
        uniform.weights = packed_weights();
        uniform.texel_step = [taps / lvl.width as f32, 0.0];
        self.composite(Composite {
            target: RenderTarget::Texture(lvl.scratch),
            size: (lvl.content_width, lvl.content_height),
            sources: [Some(lvl.primary), None],
            pixel: blur_h,
            blend: states.opaque,
            sampler: states.linear_clamp,
            uniform,
        })?;
        uniform.texel_step = [0.0, taps / lvl.height as f32];
        self.composite(Composite {
            target: RenderTarget::Texture(lvl.primary),
            size: (lvl.content_width, lvl.content_height),
            sources: [Some(lvl.scratch), None],
            pixel: blur_v,
            blend: states.opaque,
            sampler: states.linear_clamp,
            uniform,
        })?;
        self.last_blur_level = Some(level);
        Ok(level)
    }

    pub(crate) fn post_process(&mut self) -> EmberResult<()> {
        if self.batch.is_open() {
            return Err(EmberError::BatchOpen("post_process"));
        }
        let caps = self.state.caps();
        let stages = PostStages {
            bloom: caps.contains(Capabilities::BLOOM | Capabilities::HDR),
            hdr: caps.contains(Capabilities::HDR),
            blur: caps.contains(Capabilities::BLUR),
            spread: self.state.top().blur_spread,
            vignette: if caps.contains(Capabilities::VIGNETTE) { POST_FLAG_VIGNETTE } else { 0 },
        };
        self.enter_pass(Pass::PostProcess)?;
        let result = self.run_stages(stages);
        self.post_calls += 1;
        result
    }

    fn run_stages(&mut self, PostStages { bloom, hdr, blur, spread, vignette }: PostStages) -> EmberResult<()> {
        let programs = self.resources.programs.clone();
        let targets = self.resources.targets.clone();
        let full = (targets.width, targets.height);
        let back_buffer_blend = if self.post_calls == 0 { self.resources.states.opaque } else { self.resources.states.additive };
        let states = self.resources.states;
        let mut bloom_source = None;
        if bloom {
            let first = targets.blur[1.min(targets.blur.len() - 1)];
            self.composite(Composite {
                target: RenderTarget::Texture(first.primary),
                size: (first.content_width, first.content_height),
                sources: [Some(targets.accumulation), None],
                pixel: programs.ldr_subtract_ps,
                blend: states.opaque,
                sampler: states.linear_clamp,
                uniform: PostUniform::sample([1.0, 1.0], 0),
            })?;
            let level = self.blur_cascade(1, BLOOM_SPREAD)?;
            let result = targets.blur[level];
            self.composite(Composite {
                target: RenderTarget::Texture(targets.bloom),
                size: full,
                sources: [Some(result.primary), None],
                pixel: programs.pass_through_ps,
                blend: states.opaque,
                sampler: states.linear_clamp,
                uniform: PostUniform::sample(result.uv_max(), 0),
            })?;
            bloom_source = Some(targets.bloom);
        }

        let (output, output_blend, output_flags) = if blur {
            (RenderTarget::Texture(targets.blur[0].primary), states.opaque, 0)
        } else {
            (RenderTarget::BackBuffer, back_buffer_blend, vignette)
        };
        let output_size = if blur { (targets.blur[0].content_width, targets.blur[0].content_height) } else { full };

        if hdr {
            let bloom_tex = bloom_source.unwrap_or(self.resources.defaults.black);
            self.composite(Composite {
                target: output,
                size: output_size,
                sources: [Some(targets.accumulation), Some(bloom_tex)],
                pixel: programs.tone_map_ps,
                blend: output_blend,
                sampler: states.linear_clamp,
                uniform: PostUniform::sample([1.0, 1.0], output_flags),
            })?;
        } else if blur {
            self.composite(Composite {
                target: output,
                size: output_size,
                sources: [Some(targets.accumulation), None],
                pixel: programs.pass_through_ps,
                blend: output_blend,
                sampler: states.point_clamp,
                uniform: PostUniform::sample([1.0, 1.0], output_flags),
            })?;
        }

        if blur {
            let level = self.blur_cascade(0, spread)?;
            let result = targets.blur[level];
            self.composite(Composite {
                target: RenderTarget::BackBuffer,
                size: full,
                sources: [Some(result.primary), None],
                pixel: programs.pass_through_ps,
                blend: back_buffer_blend,
                sampler: states.linear_clamp,
                uniform: PostUniform::sample(result.uv_max(), vignette),
            })?;
        }

        if !hdr && !blur {
            self.composite(Composite {
                target: RenderTarget::BackBuffer,
                size: full,
                sources: [Some(targets.accumulation), None],
                pixel: programs.pass_through_ps,
                blend: back_buffer_blend,
                sampler: states.point_clamp,
                uniform: PostUniform::sample([1.0, 1.0], vignette),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_choice_table() {
        assert_eq!(choose_level(0, 20.0, 8), (2, 5.0));
        assert_eq!(choose_level(0, 8.0, 8), (0, 8.0));
        assert_eq!(choose_level(0, 8.5, 8), (1, 4.25));
        assert_eq!(choose_level(1, 16.0, 8), (2, 8.0));
        assert_eq!(choose_level(0, 1.0e6, 8).0, 7);
        assert_eq!(choose_level(0, 1.0e6, 3).0, 2);
        assert_eq!(choose_level(0, 0.0, 8), (0, 0.0));
    }

    #[test]
    fn gaussian_is_normalized_and_decreasing() {
        let w = gaussian_weights();
        let total = w[0] + 2.0 * w[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(w.windows(2).all(|p| p[0] > p[1]));
    }

    #[test]
    fn post_uniform_layout() {
        assert_eq!(std::mem::size_of::<PostUniform>(), 80);
        let packed = packed_weights();
        assert_eq!(packed[2][1], 0.0);
        assert_eq!(packed[0][0], gaussian_weights()[0]);
    }
}
