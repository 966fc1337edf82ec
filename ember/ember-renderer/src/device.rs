//! One Ember device: the executor it draws through, its GPU resources, the transform and state
//! stacks, the batch and the texture table. `Context` owns devices and forwards the public calls.

use render_api::{GpuExecutor, RenderTarget, Viewport};

use crate::batch::Batch;
use crate::config::EmberConfig;
use crate::error::{EmberError, EmberResult};
use crate::math::{self, Matrix, Vec3};
use crate::pass::Pass;
use crate::resources::DeviceResources;
use crate::state::StateStack;
use crate::texture::{MaterialBindings, TextureEntry};
use crate::transform::MatrixStack;
use crate::vertex::Vertex;

bitflags::bitflags! {
    /// Targets cleared by `clear`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Accumulation target and back buffer, to the clear color.
        const COLOR = 1 << 0;
        const DEPTH_STENCIL = 1 << 1;
        /// Diffuse, normal and material to zero, the depth target to far.
        const G_BUFFER = 1 << 2;
        const ALL = Self::COLOR.bits() | Self::DEPTH_STENCIL.bits() | Self::G_BUFFER.bits();
    }
}

/// Current vertex and light attributes, applied to every submitted position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attributes {
    pub vertex: Vertex,
    pub radius: f32,
    pub multiplier: f32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self { vertex: Vertex::default(), radius: 1.0, multiplier: 1.0 }
    }
}

pub struct Device {
    pub(crate) gpu: Box<dyn GpuExecutor>,
    pub(crate) config: EmberConfig,
    pub(crate) resources: DeviceResources,
    pub(crate) model: MatrixStack,
    pub(crate) view: Matrix,
    pub(crate) proj: Matrix,
    pub(crate) state: StateStack,
    pub(crate) batch: Batch,
    pub(crate) pass: Option<Pass>,
    pub(crate) attrs: Attributes,
    pub(crate) material: MaterialBindings,
    pub(crate) viewport: Viewport,
    pub(crate) clear_color: [f32; 4],
    pub(crate) textures: Vec<TextureEntry>,
    /// `post_process` calls since the last `swap`.
    pub(crate) post_calls: u32,
    pub(crate) last_blur_level: Option<usize>,
}

impl Device {
    /// Creates the device resources on `gpu`. On failure everything already created is released
    /// and the executor is dropped.
    pub fn create(mut gpu: Box<dyn GpuExecutor>, config: EmberConfig) -> EmberResult<Self> {
        let resources = DeviceResources::create(gpu.as_mut(), &config)?;
        let (w, h) = gpu.back_buffer_size();
        log::debug!("device created ({w}x{h}, batch capacity {})", config.batch_capacity);
        Ok(Self {
            gpu,
            resources,
            model: MatrixStack::new(config.stack_capacity),
            view: Matrix::IDENTITY,
            proj: Matrix::IDENTITY,
            state: StateStack::new(config.stack_capacity, config.default_blur_spread),
            batch: Batch::new(config.batch_capacity),
            pass: None,
            attrs: Attributes::default(),
            material: MaterialBindings::default(),
            viewport: Viewport::new(0.0, 0.0, w as f32, h as f32),
            clear_color: [0.0; 4],
            textures: Vec::new(),
            post_calls: 0,
            last_blur_level: None,
            config,
        })
    }

    /// Releases every GPU object in teardown order and hands the executor back.
    pub fn destroy(self) -> Box<dyn GpuExecutor> {
        let Device { mut gpu, resources, mut state, textures, .. } = self;
        resources.release(gpu.as_mut(), textures.iter().map(|t| t.id));
        state.release(gpu.as_mut());
        log::debug!("device destroyed ({} textures released)", textures.len());
        gpu
    }

    pub fn executor(&self) -> &dyn GpuExecutor {
        self.gpu.as_ref()
    }

    pub fn executor_mut(&mut self) -> &mut dyn GpuExecutor {
        self.gpu.as_mut()
    }

    pub fn pass(&self) -> Option<Pass> { self.pass }
    pub fn batch_open(&self) -> bool { self.batch.is_open() }
    pub fn state(&self) -> &StateStack { &self.state }
    pub fn model(&self) -> &MatrixStack { &self.model }
    pub fn view(&self) -> &Matrix { &self.view }
    pub fn proj(&self) -> &Matrix { &self.proj }
    pub fn viewport(&self) -> Viewport { self.viewport }
    pub fn texture_count(&self) -> usize { self.textures.len() }
    pub fn last_blur_level(&self) -> Option<usize> { self.last_blur_level }
    pub fn attributes(&self) -> &Attributes { &self.attrs }

    pub(crate) fn reject_in_batch(&self, op: &'static str) -> EmberResult<()> {
        if self.batch.is_open() {
            return Err(EmberError::BatchOpen(op));
        }
        Ok(())
    }

    // ---- frame ----

    pub(crate) fn clear(&mut self, flags: ClearFlags) -> EmberResult<()> {
        self.reject_in_batch("clear")?;
        let targets = &self.resources.targets;
        if flags.contains(ClearFlags::COLOR) {
            self.gpu.clear_render_target(RenderTarget::Texture(targets.accumulation), self.clear_color);
            self.gpu.clear_render_target(RenderTarget::BackBuffer, self.clear_color);
        }
        if flags.contains(ClearFlags::G_BUFFER) {
            for id in [targets.diffuse, targets.normal, targets.material] {
                self.gpu.clear_render_target(RenderTarget::Texture(id), [0.0; 4]);
            }
            self.gpu.clear_render_target(RenderTarget::Texture(targets.depth), [1.0; 4]);
        }
        if flags.contains(ClearFlags::DEPTH_STENCIL) {
            self.gpu.clear_depth_stencil(1.0, 0);
        }
        Ok(())
    }

    pub(crate) fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.viewport = Viewport::new(x, y, width, height);
        if matches!(self.pass, Some(p) if p != Pass::Spot) {
            self.gpu.set_viewport(self.viewport);
        }
    }

    // ---- camera ----

    /// Screen-space projection over the current viewport, origin top-left.
    pub(crate) fn set_2d_view_proj(&mut self, near: f32, far: f32) {
        let vp = self.viewport;
        self.view = Matrix::IDENTITY;
        self.proj = math::ortho_2d(vp.x, vp.y, vp.width, vp.height, near, far);
    }

    pub(crate) fn set_3d_view_proj(&mut self, eye: Vec3, center: Vec3, up: Vec3, fov_deg: f32, near: f32, far: f32) {
        let aspect = if self.viewport.height > 0.0 { self.viewport.width / self.viewport.height } else { 1.0 };
        self.view = math::look_at(eye, center, up);
        self.proj = math::perspective(fov_deg.to_radians(), aspect, near, far);
    }

    pub(crate) fn set_view_proj(&mut self, view: Matrix, proj: Matrix) {
        self.view = view;
        self.proj = proj;
    }

    // ---- model stack ----

    /// Applies `m` before the current model transform.
    pub(crate) fn apply_model(&mut self, m: &Matrix) {
        let top = self.model.top_mut();
        *top = math::multiply(m, top);
    }

    // ---- state ----

    pub(crate) fn state_pop(&mut self) -> EmberResult<()> {
        self.state.pop();
        if self.pass == Some(Pass::Geometry) {
            self.state.resolve(self.gpu.as_mut(), &self.resources.programs)?;
        }
        Ok(())
    }

    // ---- present ----

    pub(crate) fn swap(&mut self) -> EmberResult<()> {
        self.reject_in_batch("swap")?;
        self.gpu.present()?;
        self.model.reset();
        self.state.reset();
        self.post_calls = 0;
        if self.resources.ensure_target_size(self.gpu.as_mut(), &self.config)? {
            let t = &self.resources.targets;
            log::debug!("render targets resized to {}x{}", t.width, t.height);
            self.pass = None;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("pass", &self.pass)
            .field("batch_open", &self.batch.is_open())
            .field("textures", &self.textures.len())
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}
