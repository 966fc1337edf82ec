//! Device-owned GPU resources: programs, G-Buffer / accumulation / bloom / blur targets, default
//! textures, constant and vertex buffers, and the fixed state objects used by full-screen passes.

use render_api::{
    BlendDesc, BufferDesc, BufferId, BufferUsage, CompareFunc, DepthDesc, GpuError, GpuExecutor, ProgramId,
    ProgramKind, RasterDesc, RenderTargetDesc, SamplerDesc, StateDesc, StateId, TextureDesc, TextureFormat,
    TextureId,
};

use crate::config::EmberConfig;
use crate::gbuffer::ObjectUniform;
use crate::light_pass::LightUniform;
use crate::post_process::PostUniform;
use crate::vertex::{Vertex, FULL_SCREEN_QUAD};

/// Constant buffer slots shared by every program.
pub const OBJECT_SLOT: u32 = 0;
pub const LIGHT_SLOT: u32 = 1;
pub const POST_SLOT: u32 = 2;

/// A created GPU object, recorded so a failed build or a teardown can release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owned {
    Texture(TextureId),
    Target(TextureId),
    Buffer(BufferId),
    Program(ProgramId),
    State(StateId),
}

impl Owned {
    /// Teardown rank: textures, targets, buffers, programs, state objects.
    fn rank(self) -> u8 {
        match self {
            Owned::Texture(_) => 0,
            Owned::Target(_) => 1,
            Owned::Buffer(_) => 2,
            Owned::Program(_) => 3,
            Owned::State(_) => 4,
        }
    }

    fn release(self, gpu: &mut dyn GpuExecutor) {
        match self {
            Owned::Texture(id) | Owned::Target(id) => gpu.release_texture(id),
            Owned::Buffer(id) => gpu.release_buffer(id),
            Owned::Program(id) => gpu.release_program(id),
            Owned::State(id) => gpu.release_state(id),
        }
    }
}

/// Creation log used while building device resources.
#[derive(Default)]
struct Tracker {
    created: Vec<Owned>,
}

impl Tracker {
    fn program(&mut self, gpu: &mut dyn GpuExecutor, kind: ProgramKind) -> Result<ProgramId, GpuError> {
        let id = gpu.compile_program(kind)?;
        self.created.push(Owned::Program(id));
        Ok(id)
    }

    fn state(&mut self, gpu: &mut dyn GpuExecutor, desc: StateDesc) -> Result<StateId, GpuError> {
        let id = gpu.create_state(&desc)?;
        self.created.push(Owned::State(id));
        Ok(id)
    }

    fn buffer(&mut self, gpu: &mut dyn GpuExecutor, label: &'static str, size: u64, usage: BufferUsage) -> Result<BufferId, GpuError> {
        let id = gpu.create_buffer(&BufferDesc { label, size, usage })?;
        self.created.push(Owned::Buffer(id));
        Ok(id)
    }

    fn target(
        &mut self,
        gpu: &mut dyn GpuExecutor,
        label: &'static str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, GpuError> {
        let id = gpu.create_render_target(&RenderTargetDesc { label, width, height, format })?;
        self.created.push(Owned::Target(id));
        Ok(id)
    }

    fn solid_texture(&mut self, gpu: &mut dyn GpuExecutor, label: &'static str, rgba: [u8; 4]) -> Result<TextureId, GpuError> {
        let desc = TextureDesc { label, width: 1, height: 1, format: TextureFormat::Rgba8Unorm };
        let id = gpu.create_texture(&desc, &[rgba.to_vec()])?;
        self.created.push(Owned::Texture(id));
        Ok(id)
    }

    /// Releases everything created so far in teardown order.
    fn rollback(mut self, gpu: &mut dyn GpuExecutor) {
        release_in_order(gpu, &mut self.created);
    }
}

fn release_in_order(gpu: &mut dyn GpuExecutor, owned: &mut Vec<Owned>) {
    owned.sort_by_key(|o| o.rank());
    for o in owned.drain(..) {
        o.release(gpu);
    }
}

/// Every program a device binds.
#[derive(Debug, Clone)]
pub struct Programs {
    pub geometry_vs: ProgramId,
    pub full_screen_vs: ProgramId,
    geometry_base: ProgramId,
    geometry_alpha: [ProgramId; 8],
    pub ambient_ps: ProgramId,
    pub omni_ps: ProgramId,
    pub pass_through_ps: ProgramId,
    pub ldr_subtract_ps: ProgramId,
    pub tone_map_ps: ProgramId,
    pub blur_h_ps: ProgramId,
    pub blur_v_ps: ProgramId,
}

impl Programs {
    /// Compiles the full set; on failure nothing stays alive.
    pub fn compile(gpu: &mut dyn GpuExecutor) -> Result<Self, GpuError> {
        let mut tracker = Tracker::default();
        match Self::compile_tracked(gpu, &mut tracker) {
            Ok(p) => Ok(p),
            Err(e) => {
                tracker.rollback(gpu);
                Err(e)
            }
        }
    }

    fn compile_tracked(gpu: &mut dyn GpuExecutor, t: &mut Tracker) -> Result<Self, GpuError> {
        let geometry_vs = t.program(gpu, ProgramKind::GeometryVertex)?;
        let full_screen_vs = t.program(gpu, ProgramKind::FullScreenVertex)?;
        let geometry_base = t.program(gpu, ProgramKind::GeometryPixel(None))?;
        let mut geometry_alpha = [geometry_base; 8];
        for func in CompareFunc::ALL {
            geometry_alpha[func.index()] = t.program(gpu, ProgramKind::GeometryPixel(Some(func)))?;
        }
        Ok(Self {
            geometry_vs,
            full_screen_vs,
            geometry_base,
            geometry_alpha,
            ambient_ps: t.program(gpu, ProgramKind::AmbientPixel)?,
            omni_ps: t.program(gpu, ProgramKind::OmniPixel)?,
            pass_through_ps: t.program(gpu, ProgramKind::PassThroughPixel)?,
            ldr_subtract_ps: t.program(gpu, ProgramKind::LdrSubtractPixel)?,
            tone_map_ps: t.program(gpu, ProgramKind::ToneMapPixel)?,
            blur_h_ps: t.program(gpu, ProgramKind::BlurHorizontalPixel)?,
            blur_v_ps: t.program(gpu, ProgramKind::BlurVerticalPixel)?,
        })
    }

    /// Geometry pixel program for an alpha-test variant (`None` = alpha test off).
    pub fn geometry_pixel(&self, alpha: Option<CompareFunc>) -> ProgramId {
        match alpha {
            Some(func) => self.geometry_alpha[func.index()],
            None => self.geometry_base,
        }
    }

    fn owned(&self) -> Vec<Owned> {
        let mut ids = vec![
            self.geometry_vs,
            self.full_screen_vs,
            self.geometry_base,
            self.ambient_ps,
            self.omni_ps,
            self.pass_through_ps,
            self.ldr_subtract_ps,
            self.tone_map_ps,
            self.blur_h_ps,
            self.blur_v_ps,
        ];
        ids.extend_from_slice(&self.geometry_alpha);
        ids.into_iter().map(Owned::Program).collect()
    }

    /// Releases every program in the set.
    pub fn release(&self, gpu: &mut dyn GpuExecutor) {
        for o in self.owned() {
            o.release(gpu);
        }
    }
}

/// One level of the blur chain: primary target, scratch target for the horizontal pass.
#[derive(Debug, Clone, Copy)]
pub struct BlurLevel {
    pub primary: TextureId,
    pub scratch: TextureId,
    /// Allocated extent (power-of-two base, halved per level).
    pub width: u32,
    pub height: u32,
    /// Extent actually covered by the downsampled image.
    pub content_width: u32,
    pub content_height: u32,
}

impl BlurLevel {
    /// Fraction of the texture covered by content, per axis.
    pub fn uv_max(&self) -> [f32; 2] {
        [
            self.content_width as f32 / self.width as f32,
            self.content_height as f32 / self.height as f32,
        ]
    }
}

/// Texture and content extents of blur level `level` for a `width` x `height` back buffer.
pub fn blur_level_extent(width: u32, height: u32, level: usize) -> ((u32, u32), (u32, u32)) {
    let shift = level as u32;
    let tex = |v: u32| (v.max(1).next_power_of_two() >> shift).max(1);
    let content = |v: u32| (v.max(1).div_ceil(1 << shift)).max(1);
    ((tex(width), tex(height)), (content(width), content(height)))
}

/// Render targets sized to the back buffer.
#[derive(Debug, Clone)]
pub struct Targets {
    pub width: u32,
    pub height: u32,
    pub diffuse: TextureId,
    pub depth: TextureId,
    pub normal: TextureId,
    pub material: TextureId,
    pub accumulation: TextureId,
    pub bloom: TextureId,
    pub blur: Vec<BlurLevel>,
}

impl Targets {
    fn create(gpu: &mut dyn GpuExecutor, t: &mut Tracker, config: &EmberConfig) -> Result<Self, GpuError> {
        let (width, height) = gpu.back_buffer_size();
        let (width, height) = (width.max(1), height.max(1));
        let hdr = config.hdr_format;
        let diffuse = t.target(gpu, "gbuffer_diffuse", width, height, TextureFormat::Rgba8Unorm)?;
        // z/w in a filterable float target
        let depth = t.target(gpu, "gbuffer_depth", width, height, TextureFormat::Rgba16Float)?;
        let normal = t.target(gpu, "gbuffer_normal", width, height, TextureFormat::Rgba16Float)?;
        let material = t.target(gpu, "gbuffer_material", width, height, TextureFormat::Rgba8Unorm)?;
        let accumulation = t.target(gpu, "accumulation", width, height, hdr)?;
        let bloom = t.target(gpu, "bloom", width, height, hdr)?;
        let mut blur = Vec::with_capacity(config.blur_levels);
        for level in 0..config.blur_levels {
            let ((w, h), (cw, ch)) = blur_level_extent(width, height, level);
            blur.push(BlurLevel {
                primary: t.target(gpu, "blur", w, h, hdr)?,
                scratch: t.target(gpu, "blur_scratch", w, h, hdr)?,
                width: w,
                height: h,
                content_width: cw,
                content_height: ch,
            });
        }
        Ok(Self { width, height, diffuse, depth, normal, material, accumulation, bloom, blur })
    }

    /// G-Buffer in shader-input slot order.
    pub fn gbuffer(&self) -> [TextureId; 4] {
        [self.diffuse, self.depth, self.normal, self.material]
    }

    fn owned(&self) -> Vec<Owned> {
        let mut ids = vec![self.diffuse, self.depth, self.normal, self.material, self.accumulation, self.bloom];
        for level in &self.blur {
            ids.push(level.primary);
            ids.push(level.scratch);
        }
        ids.into_iter().map(Owned::Target).collect()
    }
}

/// Fallback textures bound when a texture handle is 0.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub diffuse: TextureId,
    pub normal: TextureId,
    pub material: TextureId,
    pub black: TextureId,
}

/// State objects bound by lighting and post-process passes.
#[derive(Debug, Clone, Copy)]
pub struct FixedStates {
    pub opaque: StateId,
    pub additive: StateId,
    pub no_depth: StateId,
    pub full_screen: StateId,
    pub point_clamp: StateId,
    pub linear_clamp: StateId,
}

impl FixedStates {
    fn owned(&self) -> Vec<Owned> {
        [self.opaque, self.additive, self.no_depth, self.full_screen, self.point_clamp, self.linear_clamp]
            .into_iter()
            .map(Owned::State)
            .collect()
    }
}

/// Vertex buffer size class.
#[derive(Debug, Clone, Copy)]
pub struct VertexBucket {
    pub capacity: usize,
    pub buffer: BufferId,
}

pub struct DeviceResources {
    pub programs: Programs,
    pub targets: Targets,
    pub defaults: Defaults,
    pub states: FixedStates,
    pub object_cb: BufferId,
    pub light_cb: BufferId,
    pub post_cb: BufferId,
    /// Largest first.
    pub buckets: Vec<VertexBucket>,
    pub quad: BufferId,
}

impl DeviceResources {
    /// Creates every device resource. On failure everything created so far is released.
    pub fn create(gpu: &mut dyn GpuExecutor, config: &EmberConfig) -> Result<Self, GpuError> {
        let mut tracker = Tracker::default();
        match Self::create_tracked(gpu, &mut tracker, config) {
            Ok(r) => Ok(r),
            Err(e) => {
                log::error!("device resource creation failed after {} objects: {e}", tracker.created.len());
                tracker.rollback(gpu);
                Err(e)
            }
        }
    }

    fn create_tracked(gpu: &mut dyn GpuExecutor, t: &mut Tracker, config: &EmberConfig) -> Result<Self, GpuError> {
        let defaults = Defaults {
            diffuse: t.solid_texture(gpu, "default_diffuse", [255, 255, 255, 255])?,
            normal: t.solid_texture(gpu, "default_normal", [128, 128, 255, 255])?,
            material: t.solid_texture(gpu, "default_material", [128, 128, 0, 255])?,
            black: t.solid_texture(gpu, "default_black", [0, 0, 0, 0])?,
        };
        let targets = Targets::create(gpu, t, config)?;

        let object_cb = t.buffer(gpu, "object_constants", std::mem::size_of::<ObjectUniform>() as u64, BufferUsage::CONSTANT)?;
        let light_cb = t.buffer(gpu, "light_constants", std::mem::size_of::<LightUniform>() as u64, BufferUsage::CONSTANT)?;
        let post_cb = t.buffer(gpu, "post_constants", std::mem::size_of::<PostUniform>() as u64, BufferUsage::CONSTANT)?;
        let stride = std::mem::size_of::<Vertex>() as u64;
        let mut buckets = Vec::new();
        for capacity in config.vertex_buckets() {
            let buffer = t.buffer(gpu, "batch_vertices", capacity as u64 * stride, BufferUsage::VERTEX)?;
            buckets.push(VertexBucket { capacity, buffer });
        }
        let quad = t.buffer(gpu, "full_screen_quad", FULL_SCREEN_QUAD.len() as u64 * stride, BufferUsage::VERTEX)?;
        gpu.write_buffer(quad, bytemuck::cast_slice(&FULL_SCREEN_QUAD))?;

        let programs = Programs::compile_tracked(gpu, t)?;

        let states = FixedStates {
            opaque: t.state(gpu, StateDesc::Blend(BlendDesc::OPAQUE))?,
            additive: t.state(gpu, StateDesc::Blend(BlendDesc::ADDITIVE))?,
            no_depth: t.state(gpu, StateDesc::Depth(DepthDesc::DISABLED))?,
            full_screen: t.state(gpu, StateDesc::Raster(RasterDesc::FULL_SCREEN))?,
            point_clamp: t.state(gpu, StateDesc::Sampler(SamplerDesc::POINT_CLAMP))?,
            linear_clamp: t.state(gpu, StateDesc::Sampler(SamplerDesc::LINEAR_CLAMP))?,
        };

        Ok(Self { programs, targets, defaults, states, object_cb, light_cb, post_cb, buckets, quad })
    }

    /// Smallest bucket holding `count` vertices.
    pub fn bucket_for(&self, count: usize) -> Option<VertexBucket> {
        self.buckets.iter().rev().find(|b| b.capacity >= count).copied()
    }

    /// Recreates the render targets when the back buffer size changed. Returns true if it did.
    pub fn ensure_target_size(&mut self, gpu: &mut dyn GpuExecutor, config: &EmberConfig) -> Result<bool, GpuError> {
        let (w, h) = gpu.back_buffer_size();
        if (w.max(1), h.max(1)) == (self.targets.width, self.targets.height) {
            return Ok(false);
        }
        let mut tracker = Tracker::default();
        let targets = match Targets::create(gpu, &mut tracker, config) {
            Ok(t) => t,
            Err(e) => {
                tracker.rollback(gpu);
                return Err(e);
            }
        };
        let mut old = self.targets.owned();
        release_in_order(gpu, &mut old);
        self.targets = targets;
        Ok(true)
    }

    /// Releases device resources in teardown order. `textures` are the user texture table entries.
    pub fn release(self, gpu: &mut dyn GpuExecutor, textures: impl IntoIterator<Item = TextureId>) {
        let mut owned: Vec<Owned> = textures.into_iter().map(Owned::Texture).collect();
        owned.extend(
            [self.defaults.diffuse, self.defaults.normal, self.defaults.material, self.defaults.black]
                .into_iter()
                .map(Owned::Texture),
        );
        owned.extend(self.targets.owned());
        owned.extend([self.object_cb, self.light_cb, self.post_cb, self.quad].into_iter().map(Owned::Buffer));
        owned.extend(self.buckets.iter().map(|b| Owned::Buffer(b.buffer)));
        owned.extend(self.programs.owned());
        owned.extend(self.states.owned());
        release_in_order(gpu, &mut owned);
    }
}
