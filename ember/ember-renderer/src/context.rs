//! Public immediate-mode API. A `Context` owns the device table and the bound device; every call
//! operates on the bound device. Failures never surface as `Result` here: the call becomes a
//! no-op, the error is kept as the context's last error, and handle-returning calls return 0.

use std::any::Any;

use render_api::{BlendFactor, CompareFunc, FilterMode, FrontFace, GpuExecutor};

use crate::batch::Topology;
use crate::config::EmberConfig;
use crate::device::{Attributes, ClearFlags, Device};
use crate::error::{EmberError, EmberResult};
use crate::math::{self, Matrix, Vec3};
use crate::pass::Pass;
use crate::state::Capabilities;
use crate::texture::{PixelFormat, TextureFlags};

/// Devices a context can hold at once.
pub const MAX_DEVICES: usize = 32;

#[derive(Debug, Default)]
pub struct Context {
    config: EmberConfig,
    devices: Vec<Option<Device>>,
    bound: Option<usize>,
    last_error: Option<EmberError>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(EmberConfig::default())
    }

    pub fn with_config(config: EmberConfig) -> Self {
        Self { config: config.sanitized(), devices: Vec::new(), bound: None, last_error: None }
    }

    pub fn config(&self) -> &EmberConfig {
        &self.config
    }

    // ---- errors ----

    /// Last failure recorded by any call, until `clear_error`.
    pub fn error(&self) -> Option<&EmberError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn set_error(&mut self, e: EmberError) {
        self.last_error = Some(e);
    }

    fn record(&mut self, op: &str, e: EmberError) {
        match &e {
            EmberError::Gpu(gpu) => log::error!("{op}: {gpu}"),
            other => log::warn!("{op}: {other}"),
        }
        self.last_error = Some(e);
    }

    fn bound_mut(&mut self) -> EmberResult<&mut Device> {
        self.bound
            .and_then(|i| self.devices.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or(EmberError::NoDevice)
    }

    fn bound_ref(&self) -> Option<&Device> {
        self.bound.and_then(|i| self.devices.get(i)).and_then(Option::as_ref)
    }

    /// Runs `f` on the bound device, recording any failure.
    fn with_device<T: Default>(&mut self, op: &str, f: impl FnOnce(&mut Device) -> EmberResult<T>) -> T {
        match self.bound_mut().and_then(f) {
            Ok(v) => v,
            Err(e) => {
                self.record(op, e);
                T::default()
            }
        }
    }

    /// Infallible update of the bound device; silently ignored without one.
    fn update(&mut self, f: impl FnOnce(&mut Device)) {
        if let Ok(device) = self.bound_mut() {
            f(device);
        }
    }

    fn slot(&self, handle: u32) -> EmberResult<usize> {
        let index = (handle as usize).checked_sub(1).ok_or(EmberError::InvalidDevice(handle))?;
        match self.devices.get(index) {
            Some(Some(_)) => Ok(index),
            _ => Err(EmberError::InvalidDevice(handle)),
        }
    }

    // ---- device lifecycle ----

    /// Creates a device drawing through `executor` and binds it. Returns 0 on failure, with no
    /// device bound and every partially created resource released.
    pub fn create(&mut self, executor: Box<dyn GpuExecutor>) -> u32 {
        match self.try_create(executor) {
            Ok(handle) => handle,
            Err(e) => {
                self.record("create", e);
                0
            }
        }
    }

    fn try_create(&mut self, executor: Box<dyn GpuExecutor>) -> EmberResult<u32> {
        if self.batch_open() {
            return Err(EmberError::BatchOpen("create"));
        }
        let index = match self.devices.iter().position(Option::is_none) {
            Some(i) => i,
            None if self.devices.len() < MAX_DEVICES => {
                self.devices.push(None);
                self.devices.len() - 1
            }
            None => return Err(EmberError::DeviceLimit),
        };
        self.bound = None;
        let device = Device::create(executor, self.config.clone())?;
        self.devices[index] = Some(device);
        self.bound = Some(index);
        Ok(index as u32 + 1)
    }

    /// Destroys a device. Rejected while that device has an open batch.
    pub fn destroy(&mut self, handle: u32) {
        drop(self.destroy_into_executor(handle));
    }

    /// As `destroy`, handing back the executor after every GPU object was released.
    pub fn destroy_into_executor(&mut self, handle: u32) -> Option<Box<dyn GpuExecutor>> {
        let result = self.slot(handle).and_then(|index| {
            let open = self.devices[index].as_ref().is_some_and(Device::batch_open);
            if open {
                return Err(EmberError::BatchOpen("destroy"));
            }
            Ok(index)
        });
        let index = match result {
            Ok(i) => i,
            Err(e) => {
                self.record("destroy", e);
                return None;
            }
        };
        if self.bound == Some(index) {
            self.bound = None;
        }
        let device = self.devices[index].take()?;
        Some(device.destroy())
    }

    /// Makes `handle` the bound device. Rejected while the bound device has an open batch.
    pub fn bind(&mut self, handle: u32) {
        if self.batch_open() {
            self.record("bind", EmberError::BatchOpen("bind"));
            return;
        }
        match self.slot(handle) {
            Ok(index) => self.bound = Some(index),
            Err(e) => self.record("bind", e),
        }
    }

    /// Presents the frame and resets the matrix and state stacks.
    pub fn swap(&mut self) {
        self.with_device("swap", Device::swap)
    }

    // ---- frame ----

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.update(|d| d.clear_color = [r, g, b, a]);
    }

    pub fn clear(&mut self, flags: ClearFlags) {
        self.with_device("clear", |d| d.clear(flags))
    }

    pub fn viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.update(|d| d.set_viewport(x, y, width, height));
    }

    /// Accepted, no effect.
    pub fn scissor(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {}

    // ---- camera ----

    /// Screen-space orthographic projection over the current viewport, identity view.
    pub fn set_2d_view_proj(&mut self, near: f32, far: f32) {
        self.update(|d| d.set_2d_view_proj(near, far));
    }

    pub fn set_3d_view_proj(&mut self, eye: Vec3, center: Vec3, up: Vec3, fov_deg: f32, near: f32, far: f32) {
        self.update(|d| d.set_3d_view_proj(eye, center, up, fov_deg, near, far));
    }

    pub fn set_view_proj(&mut self, view: &Matrix, proj: &Matrix) {
        self.update(|d| d.set_view_proj(*view, *proj));
    }

    // ---- model stack ----

    pub fn identity(&mut self) {
        self.update(|d| *d.model.top_mut() = Matrix::IDENTITY);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.apply_model(&math::translation(x, y, z)));
    }

    pub fn translate_v(&mut self, v: &Vec3) {
        self.translate(v[0], v[1], v[2]);
    }

    /// Rotation in degrees about x, then y, then z.
    pub fn rotate(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.apply_model(&math::rotation(x, y, z)));
    }

    pub fn rotate_v(&mut self, v: &Vec3) {
        self.rotate(v[0], v[1], v[2]);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.apply_model(&math::scale(x, y, z)));
    }

    pub fn scale_v(&mut self, v: &Vec3) {
        self.scale(v[0], v[1], v[2]);
    }

    pub fn mult(&mut self, m: &Matrix) {
        self.update(|d| d.apply_model(m));
    }

    pub fn push(&mut self) {
        self.update(|d| d.model.push());
    }

    pub fn pop(&mut self) {
        self.update(|d| d.model.pop());
    }

    // ---- batch ----

    pub fn begin(&mut self, topology: Topology) {
        self.with_device("begin", |d| d.begin(topology))
    }

    pub fn end(&mut self) {
        self.with_device("end", Device::end)
    }

    pub fn color3(&mut self, r: f32, g: f32, b: f32) {
        self.color4(r, g, b, 1.0);
    }

    pub fn color3_v(&mut self, c: &[f32; 3]) {
        self.color4(c[0], c[1], c[2], 1.0);
    }

    pub fn color4(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.update(|d| d.attrs.vertex.color = [r, g, b, a]);
    }

    pub fn color4_v(&mut self, c: &[f32; 4]) {
        self.color4(c[0], c[1], c[2], c[3]);
    }

    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.attrs.vertex.normal = [x, y, z]);
    }

    pub fn normal_v(&mut self, v: &Vec3) {
        self.normal(v[0], v[1], v[2]);
    }

    pub fn tangent(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.attrs.vertex.tangent = [x, y, z]);
    }

    pub fn tangent_v(&mut self, v: &Vec3) {
        self.tangent(v[0], v[1], v[2]);
    }

    pub fn binormal(&mut self, x: f32, y: f32, z: f32) {
        self.update(|d| d.attrs.vertex.binormal = [x, y, z]);
    }

    pub fn binormal_v(&mut self, v: &Vec3) {
        self.binormal(v[0], v[1], v[2]);
    }

    pub fn tex_coord(&mut self, s: f32, t: f32) {
        self.update(|d| d.attrs.vertex.texcoord = [s, t]);
    }

    pub fn tex_coord_v(&mut self, st: &[f32; 2]) {
        self.tex_coord(st[0], st[1]);
    }

    pub fn position2(&mut self, x: f32, y: f32) {
        self.position3(x, y, 0.0);
    }

    pub fn position2_v(&mut self, p: &[f32; 2]) {
        self.position3(p[0], p[1], 0.0);
    }

    pub fn position3(&mut self, x: f32, y: f32, z: f32) {
        self.with_device("position", |d| d.emit_position([x, y, z]))
    }

    pub fn position3_v(&mut self, p: &Vec3) {
        self.position3(p[0], p[1], p[2]);
    }

    /// Accepted, no effect.
    pub fn target2(&mut self, _x: f32, _y: f32) {}

    /// Accepted, no effect.
    pub fn target3(&mut self, _x: f32, _y: f32, _z: f32) {}

    /// Light radius for following Omni positions.
    pub fn radius(&mut self, r: f32) {
        self.update(|d| d.attrs.radius = r);
    }

    /// Accepted, no effect.
    pub fn radius2(&mut self, _inner: f32, _outer: f32) {}

    /// Light intensity scale for following light positions.
    pub fn multiply(&mut self, m: f32) {
        self.update(|d| d.attrs.multiplier = m);
    }

    /// Accepted, no effect.
    pub fn falloff_exponent(&mut self, _e: f32) {}

    /// Accepted, no effect.
    pub fn specular(&mut self, _level: f32, _power: f32) {}

    /// Accepted, no effect.
    pub fn self_illum(&mut self, _level: f32) {}

    // ---- textures ----

    /// Converts `data` to RGBA8 and uploads it. Returns a 1-based handle, 0 on failure.
    pub fn create_texture_2d(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        format: PixelFormat,
        flags: TextureFlags,
    ) -> u32 {
        self.with_device("create_texture_2d", |d| d.create_texture_2d(width, height, data, format, flags))
    }

    /// Diffuse texture for following draws; 0 selects the default.
    pub fn bind_diffuse(&mut self, handle: u32) {
        self.with_device("bind_diffuse", |d| {
            d.material.diffuse = d.check_texture(handle)?;
            Ok(())
        })
    }

    pub fn bind_normal(&mut self, handle: u32) {
        self.with_device("bind_normal", |d| {
            d.material.normal = d.check_texture(handle)?;
            Ok(())
        })
    }

    pub fn bind_material(&mut self, handle: u32) {
        self.with_device("bind_material", |d| {
            d.material.material = d.check_texture(handle)?;
            Ok(())
        })
    }

    /// Accepted, no effect. Textures live until their device is destroyed.
    pub fn destroy_texture(&mut self, _handle: u32) {}

    // ---- state ----

    pub fn enable(&mut self, caps: Capabilities) {
        self.update(|d| d.state.enable(caps));
    }

    pub fn disable(&mut self, caps: Capabilities) {
        self.update(|d| d.state.disable(caps));
    }

    pub fn state_push(&mut self) {
        self.update(|d| d.state.push());
    }

    pub fn state_pop(&mut self) {
        self.with_device("state_pop", Device::state_pop)
    }

    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.update(|d| d.state.blend_func(src, dst));
    }

    pub fn front_face(&mut self, face: FrontFace) {
        self.update(|d| d.state.front_face(face));
    }

    pub fn filter(&mut self, filter: FilterMode) {
        self.update(|d| d.state.filter(filter));
    }

    /// Alpha test comparison; `reference` is clamped to [0, 1].
    pub fn alpha_func(&mut self, func: CompareFunc, reference: f32) {
        self.update(|d| d.state.alpha_func(func, reference));
    }

    pub fn depth_func(&mut self, func: CompareFunc) {
        self.update(|d| d.state.depth_func(func));
    }

    /// Blur spread in pixels used by `post_process` when BLUR is enabled.
    pub fn blur(&mut self, spread: f32) {
        self.update(|d| d.state.blur(spread));
    }

    // ---- post ----

    /// Composites the accumulated frame onto the back buffer. Call at least once per frame.
    pub fn post_process(&mut self) {
        self.with_device("post_process", Device::post_process)
    }

    // ---- introspection ----

    /// Handle of the bound device, 0 if none.
    pub fn bound_device(&self) -> u32 {
        self.bound.map_or(0, |i| i as u32 + 1)
    }

    pub fn device(&self, handle: u32) -> Option<&Device> {
        let index = self.slot(handle).ok()?;
        self.devices[index].as_ref()
    }

    pub fn batch_open(&self) -> bool {
        self.bound_ref().is_some_and(Device::batch_open)
    }

    pub fn current_pass(&self) -> Option<Pass> {
        self.bound_ref().and_then(Device::pass)
    }

    pub fn matrix_depth(&self) -> usize {
        self.bound_ref().map_or(0, |d| d.model().depth())
    }

    pub fn state_depth(&self) -> usize {
        self.bound_ref().map_or(0, |d| d.state().depth())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.bound_ref().map_or(Capabilities::empty(), |d| d.state().caps())
    }

    pub fn texture_count(&self) -> usize {
        self.bound_ref().map_or(0, Device::texture_count)
    }

    /// Current vertex and light attributes of the bound device.
    pub fn attributes(&self) -> Option<Attributes> {
        self.bound_ref().map(|d| *d.attributes())
    }

    pub(crate) fn set_attributes(&mut self, attrs: Attributes) {
        self.update(|d| d.attrs = attrs);
    }

    pub fn model_matrix(&self) -> Matrix {
        self.bound_ref().map_or(Matrix::IDENTITY, |d| *d.model().top())
    }

    /// Blur level the last cascade finished on.
    pub fn last_blur_level(&self) -> Option<usize> {
        self.bound_ref().and_then(Device::last_blur_level)
    }

    pub fn executor(&self) -> Option<&dyn GpuExecutor> {
        self.bound_ref().map(Device::executor)
    }

    /// Bound device's executor downcast to its concrete type.
    pub fn executor_as<T: Any>(&self) -> Option<&T> {
        self.executor()?.as_any().downcast_ref::<T>()
    }

    pub fn executor_as_mut<T: Any>(&mut self) -> Option<&mut T> {
        let device = self.bound_mut().ok()?;
        device.executor_mut().as_any_mut().downcast_mut::<T>()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for device in self.devices.iter_mut().filter_map(Option::take) {
            drop(device.destroy());
        }
    }
}
