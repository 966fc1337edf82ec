//! Render state stack: capability bits, fixed-function settings and lazily resolved GPU state objects.
//!
//! Each layer carries a dirty flag per sub-state (depth, blend, raster, sampler, alpha). Mutating the
//! top marks the owning sub-state dirty on the top and on the layer below, so a later pop forces a
//! rebuild. `resolve` additionally diffs each sub-state against the descriptor last bound, so state
//! bound by lighting or post-process passes never leaks into geometry draws.

use render_api::{
    AddressMode, BlendDesc, BlendFactor, CompareFunc, DepthDesc, FilterMode, FrontFace, GpuExecutor,
    RasterDesc, SamplerDesc, StateDesc, StateId,
};

use crate::error::EmberResult;
use crate::resources::Programs;

bitflags::bitflags! {
    /// Capability bits toggled by `enable`/`disable`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const BLEND = 1 << 0;
        const CULL = 1 << 1;
        const DEPTH_TEST = 1 << 2;
        const STENCIL_TEST = 1 << 3;
        const ALPHA_TEST = 1 << 4;
        const SCISSOR = 1 << 5;
        const GENERATE_TANGENT_BINORMAL = 1 << 6;
        const BLOOM = 1 << 7;
        const HDR = 1 << 8;
        const BLUR = 1 << 9;
        const WIREFRAME = 1 << 10;
        /// Reserved.
        const CAST_SHADOW = 1 << 11;
        /// Reserved.
        const DISTORTION = 1 << 12;
        /// Reserved.
        const AMBIENT_OCCLUSION = 1 << 13;
        const DEPTH_WRITE = 1 << 14;
        const VIGNETTE = 1 << 15;
        const LIGHTING = 1 << 16;
    }
}

bitflags::bitflags! {
    /// Sub-states that need a GPU object (or program) rebuilt before the next geometry draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dirty: u8 {
        const DEPTH = 1 << 0;
        const BLEND = 1 << 1;
        const RASTER = 1 << 2;
        const SAMPLER = 1 << 3;
        const ALPHA = 1 << 4;
    }
}

impl Capabilities {
    /// Sub-states whose descriptors read any of these bits.
    pub fn owners(self) -> Dirty {
        let mut dirty = Dirty::empty();
        if self.contains(Capabilities::BLEND) {
            dirty |= Dirty::BLEND;
        }
        if self.intersects(Capabilities::CULL | Capabilities::WIREFRAME | Capabilities::SCISSOR) {
            dirty |= Dirty::RASTER;
        }
        if self.intersects(Capabilities::DEPTH_TEST | Capabilities::DEPTH_WRITE | Capabilities::STENCIL_TEST) {
            dirty |= Dirty::DEPTH;
        }
        if self.contains(Capabilities::ALPHA_TEST) {
            dirty |= Dirty::ALPHA;
        }
        dirty
    }
}

/// One entry of the state stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateLayer {
    pub caps: Capabilities,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub front_face: FrontFace,
    pub filter: FilterMode,
    pub alpha_func: CompareFunc,
    pub alpha_ref: f32,
    pub depth_func: CompareFunc,
    pub blur_spread: f32,
    pub dirty: Dirty,
}

impl StateLayer {
    pub fn new(blur_spread: f32) -> Self {
        Self {
            caps: Capabilities::DEPTH_TEST | Capabilities::DEPTH_WRITE,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::InvSrcAlpha,
            front_face: FrontFace::Clockwise,
            filter: FilterMode::Bilinear,
            alpha_func: CompareFunc::Always,
            alpha_ref: 0.0,
            depth_func: CompareFunc::LessEqual,
            blur_spread,
            dirty: Dirty::all(),
        }
    }

    pub fn depth_desc(&self) -> DepthDesc {
        DepthDesc {
            test: self.caps.contains(Capabilities::DEPTH_TEST),
            write: self.caps.contains(Capabilities::DEPTH_WRITE),
            func: self.depth_func,
            stencil: self.caps.contains(Capabilities::STENCIL_TEST),
        }
    }

    pub fn blend_desc(&self) -> BlendDesc {
        BlendDesc { enabled: self.caps.contains(Capabilities::BLEND), src: self.blend_src, dst: self.blend_dst }
    }

    pub fn raster_desc(&self) -> RasterDesc {
        RasterDesc {
            cull: self.caps.contains(Capabilities::CULL),
            front_face: self.front_face,
            wireframe: self.caps.contains(Capabilities::WIREFRAME),
            scissor: self.caps.contains(Capabilities::SCISSOR),
        }
    }

    pub fn sampler_desc(&self) -> SamplerDesc {
        SamplerDesc { filter: self.filter, address: AddressMode::Wrap }
    }

    /// Geometry pixel program variant: the alpha comparison when alpha test is on.
    pub fn alpha_variant(&self) -> Option<CompareFunc> {
        self.caps.contains(Capabilities::ALPHA_TEST).then_some(self.alpha_func)
    }

    /// True when every setting (dirty flags excluded) matches `other`.
    pub fn same_settings(&self, other: &StateLayer) -> bool {
        let mut a = *self;
        a.dirty = other.dirty;
        a == *other
    }
}

/// A created state object and the descriptor it was built from.
#[derive(Debug, Clone, Copy)]
struct BoundObject<D> {
    desc: D,
    id: StateId,
    /// False once another pass has bound its own object of this kind.
    valid: bool,
}

#[derive(Debug, Default)]
struct Bound {
    depth: Option<BoundObject<DepthDesc>>,
    blend: Option<BoundObject<BlendDesc>>,
    raster: Option<BoundObject<RasterDesc>>,
    sampler: Option<BoundObject<SamplerDesc>>,
    alpha: Option<(Option<CompareFunc>, bool)>,
}

pub struct StateStack {
    layers: Vec<StateLayer>,
    depth: usize,
    bound: Bound,
}

impl StateStack {
    pub fn new(capacity: usize, blur_spread: f32) -> Self {
        Self { layers: vec![StateLayer::new(blur_spread); capacity.max(1)], depth: 0, bound: Bound::default() }
    }

    pub fn top(&self) -> &StateLayer {
        &self.layers[self.depth]
    }

    /// Layer at `depth` (0 = bottom), if within the current stack.
    pub fn layer(&self, depth: usize) -> Option<&StateLayer> {
        (depth <= self.depth).then(|| &self.layers[depth])
    }

    pub fn depth(&self) -> usize { self.depth }
    pub fn caps(&self) -> Capabilities { self.top().caps }
    pub fn is_enabled(&self, caps: Capabilities) -> bool { self.top().caps.contains(caps) }

    /// Duplicates the top layer, dirty flags included. No-op at capacity.
    pub fn push(&mut self) {
        if self.depth + 1 >= self.layers.len() {
            return;
        }
        self.layers[self.depth + 1] = self.layers[self.depth];
        self.depth += 1;
    }

    /// Discards the top layer. No-op at depth 0. Callers resolve afterwards.
    pub fn pop(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }

    pub fn reset(&mut self) {
        self.depth = 0;
    }

    fn mark(&mut self, dirty: Dirty) {
        if dirty.is_empty() {
            return;
        }
        self.layers[self.depth].dirty |= dirty;
        if self.depth > 0 {
            self.layers[self.depth - 1].dirty |= dirty;
        }
    }

    pub fn enable(&mut self, caps: Capabilities) {
        let changed = caps - self.top().caps;
        self.layers[self.depth].caps |= changed;
        self.mark(changed.owners());
    }

    pub fn disable(&mut self, caps: Capabilities) {
        let changed = caps & self.top().caps;
        self.layers[self.depth].caps -= changed;
        self.mark(changed.owners());
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        let top = &mut self.layers[self.depth];
        if top.blend_src != src || top.blend_dst != dst {
            top.blend_src = src;
            top.blend_dst = dst;
            self.mark(Dirty::BLEND);
        }
    }

    pub fn front_face(&mut self, face: FrontFace) {
        if self.top().front_face != face {
            self.layers[self.depth].front_face = face;
            self.mark(Dirty::RASTER);
        }
    }

    pub fn filter(&mut self, filter: FilterMode) {
        if self.top().filter != filter {
            self.layers[self.depth].filter = filter;
            self.mark(Dirty::SAMPLER);
        }
    }

    /// Reference is clamped to [0, 1].
    pub fn alpha_func(&mut self, func: CompareFunc, reference: f32) {
        let reference = if reference.is_nan() { 0.0 } else { reference.clamp(0.0, 1.0) };
        let top = &mut self.layers[self.depth];
        if top.alpha_func != func || top.alpha_ref != reference {
            top.alpha_func = func;
            top.alpha_ref = reference;
            self.mark(Dirty::ALPHA);
        }
    }

    pub fn depth_func(&mut self, func: CompareFunc) {
        if self.top().depth_func != func {
            self.layers[self.depth].depth_func = func;
            self.mark(Dirty::DEPTH);
        }
    }

    pub fn blur(&mut self, spread: f32) {
        self.layers[self.depth].blur_spread = spread.max(0.0);
    }

    /// Forget what is bound; the next resolve rebinds every sub-state.
    pub fn invalidate_bound(&mut self) {
        if let Some(b) = self.bound.depth.as_mut() {
            b.valid = false;
        }
        if let Some(b) = self.bound.blend.as_mut() {
            b.valid = false;
        }
        if let Some(b) = self.bound.raster.as_mut() {
            b.valid = false;
        }
        if let Some(b) = self.bound.sampler.as_mut() {
            b.valid = false;
        }
        if let Some(a) = self.bound.alpha.as_mut() {
            a.1 = false;
        }
    }

    /// Rebuilds and binds every sub-state that is dirty or differs from what is bound, then clears
    /// the resolved flags on the top layer and the one below it.
    pub fn resolve(&mut self, gpu: &mut dyn GpuExecutor, programs: &Programs) -> EmberResult<()> {
        let top = *self.top();
        let dirty = top.dirty;

        resolve_object(gpu, &mut self.bound.depth, top.depth_desc(), dirty.contains(Dirty::DEPTH), StateDesc::Depth)?;
        resolve_object(gpu, &mut self.bound.blend, top.blend_desc(), dirty.contains(Dirty::BLEND), StateDesc::Blend)?;
        resolve_object(gpu, &mut self.bound.raster, top.raster_desc(), dirty.contains(Dirty::RASTER), StateDesc::Raster)?;
        resolve_object(
            gpu,
            &mut self.bound.sampler,
            top.sampler_desc(),
            dirty.contains(Dirty::SAMPLER),
            StateDesc::Sampler,
        )?;

        let variant = top.alpha_variant();
        let alpha_current = matches!(self.bound.alpha, Some((v, true)) if v == variant);
        if dirty.contains(Dirty::ALPHA) || !alpha_current {
            gpu.bind_programs(programs.geometry_vs, programs.geometry_pixel(variant));
            self.bound.alpha = Some((variant, true));
        }

        self.layers[self.depth].dirty = Dirty::empty();
        if self.depth > 0 {
            self.layers[self.depth - 1].dirty -= dirty;
        }
        Ok(())
    }

    /// Releases the state objects owned by the stack.
    pub fn release(&mut self, gpu: &mut dyn GpuExecutor) {
        let ids = [
            self.bound.depth.take().map(|b| b.id),
            self.bound.blend.take().map(|b| b.id),
            self.bound.raster.take().map(|b| b.id),
            self.bound.sampler.take().map(|b| b.id),
        ];
        for id in ids.into_iter().flatten() {
            gpu.release_state(id);
        }
        self.bound.alpha = None;
    }
}

fn resolve_object<D: Copy + PartialEq>(
    gpu: &mut dyn GpuExecutor,
    slot: &mut Option<BoundObject<D>>,
    desc: D,
    dirty: bool,
    wrap: fn(D) -> StateDesc,
) -> EmberResult<()> {
    if let Some(bound) = slot.as_mut() {
        if !dirty && bound.desc == desc {
            if !bound.valid {
                gpu.bind_state(bound.id);
                bound.valid = true;
            }
            return Ok(());
        }
    }
    let id = gpu.create_state(&wrap(desc))?;
    gpu.bind_state(id);
    if let Some(old) = slot.replace(BoundObject { desc, id, valid: true }) {
        gpu.release_state(old.id);
    }
    Ok(())
}
