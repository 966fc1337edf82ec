//! `GpuExecutor` over wgpu.
//!
//! Resources live in id-keyed tables; binds only update a shadow of the current bindings. Each
//! draw resolves that shadow into a cached pipeline and a fresh bind group, then encodes one
//! load/store render pass. Queue writes are ordered before everything already submitted, so the
//! pending encoder is submitted before any buffer or texture upload.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use render_api::{
    BlendDesc, BufferDesc, BufferId, BufferUsage, DepthDesc, GpuError, GpuExecutor, PrimitiveTopology, ProgramId,
    ProgramKind, RasterDesc, RenderTarget, RenderTargetDesc, SamplerDesc, ScissorRect, StateDesc, StateId,
    TextureDesc, TextureId, Viewport, MAX_SHADER_RESOURCES,
};

use crate::config::BridgeConfig;
use crate::convert;
use crate::pipeline::{
    self, PipelineCache, PipelineKey, DEPTH_FORMAT, FALLBACK_UNIFORM_SIZE, FIRST_TEXTURE_BINDING, SAMPLER_BINDING,
    UNIFORM_SLOTS,
};
use crate::window_backend::WindowSurface;

struct Image {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl Image {
    fn new(device: &wgpu::Device, desc: &wgpu::TextureDescriptor) -> Self {
        let texture = device.create_texture(desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, format: desc.format, width: desc.size.width, height: desc.size.height }
    }

    fn attachment(device: &wgpu::Device, label: &'static str, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let usage = if format.is_depth_stencil_format() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC
        };
        Self::new(
            device,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            },
        )
    }
}

struct Buffer {
    buffer: wgpu::Buffer,
    size: u64,
}

/// Shadow of everything bound since the last draw.
#[derive(Default)]
struct Bindings {
    programs: Option<(ProgramKind, ProgramKind)>,
    depth: Option<DepthDesc>,
    blend: Option<BlendDesc>,
    raster: Option<RasterDesc>,
    sampler: Option<SamplerDesc>,
    constants: [Option<BufferId>; UNIFORM_SLOTS as usize],
    vertex: Option<BufferId>,
    targets: Vec<RenderTarget>,
    depth_attached: bool,
    resources: [Option<TextureId>; MAX_SHADER_RESOURCES],
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    topology: Option<PrimitiveTopology>,
}

/// wgpu device, queue and resource tables behind the `GpuExecutor` trait.
pub struct WgpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    window: Option<WindowSurface>,
    back_buffer: Image,
    depth: Image,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: PipelineCache,
    samplers: HashMap<SamplerDesc, wgpu::Sampler>,
    fallback_uniform: wgpu::Buffer,
    fallback_texture: Image,
    next_id: u32,
    programs: HashMap<ProgramId, ProgramKind>,
    states: HashMap<StateId, StateDesc>,
    buffers: HashMap<BufferId, Buffer>,
    textures: HashMap<TextureId, Image>,
    bound: Bindings,
    pending: Option<wgpu::CommandEncoder>,
    frames: u64,
}

impl WgpuExecutor {
    /// Offscreen executor; `present` submits and the back buffer can be read back.
    pub fn headless(width: u32, height: u32, config: BridgeConfig) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        pollster::block_on(Self::init(instance, None, (width, height), config))
    }

    /// Executor presenting to `window`. The surface holds the `Arc`, so the window outlives it.
    pub fn from_window<W>(window: Arc<W>, size: (u32, u32), config: BridgeConfig) -> Result<Self, GpuError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window).map_err(|e| GpuError::creation("surface", e.to_string()))?;
        pollster::block_on(Self::init(instance, Some(surface), size, config))
    }

    async fn init(
        instance: wgpu::Instance,
        surface: Option<wgpu::Surface<'static>>,
        (width, height): (u32, u32),
        config: BridgeConfig,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GpuError::creation("adapter", "no compatible adapter"))?;
        let polygon_line = config.wireframe && adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if polygon_line { wgpu::Features::POLYGON_MODE_LINE } else { wgpu::Features::empty() };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor { label: Some("ember_device"), required_features, ..Default::default() },
                None,
            )
            .await
            .map_err(|e| GpuError::creation("device", e.to_string()))?;
        device.on_uncaptured_error(Box::new(|e| log::error!("ember: wgpu: {e}")));
        log::info!("ember: using adapter {:?}", adapter.get_info().name);

        let bind_group_layout = pipeline::create_bind_group_layout(&device);
        let pipelines = PipelineCache::new(&device, &bind_group_layout, polygon_line);
        let window = match surface {
            Some(surface) => Some(WindowSurface::new(
                surface,
                &adapter,
                &device,
                &pipelines,
                config.back_buffer_format,
                config.present_mode,
                (width, height),
            )?),
            None => None,
        };
        let format = match &window {
            Some(w) => w.format(),
            None => config.back_buffer_format.unwrap_or(wgpu::TextureFormat::Rgba8Unorm),
        };
        let back_buffer = Image::attachment(&device, "ember_back_buffer", format, width, height);
        let depth = Image::attachment(&device, "ember_depth_stencil", DEPTH_FORMAT, width, height);
        let fallback_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember_fallback_uniform"),
            size: FALLBACK_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let fallback_texture = Image::new(
            &device,
            &wgpu::TextureDescriptor {
                label: Some("ember_fallback_texture"),
                size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
        );
        write_level(&queue, &fallback_texture.texture, 0, 1, 1, &[255; 4]);

        Ok(Self {
            device,
            queue,
            window,
            back_buffer,
            depth,
            bind_group_layout,
            pipelines,
            samplers: HashMap::new(),
            fallback_uniform,
            fallback_texture,
            next_id: 0,
            programs: HashMap::new(),
            states: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound: Bindings::default(),
            pending: None,
            frames: 0,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn back_buffer_format(&self) -> wgpu::TextureFormat {
        self.back_buffer.format
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Resizes the surface, back buffer and depth buffer. The core picks the new size up at its
    /// next swap and recreates its targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.back_buffer.width, self.back_buffer.height) {
            return;
        }
        self.submit();
        if let Some(window) = &mut self.window {
            window.resize(&self.device, width, height);
        }
        self.back_buffer = Image::attachment(&self.device, "ember_back_buffer", self.back_buffer.format, width, height);
        self.depth = Image::attachment(&self.device, "ember_depth_stencil", DEPTH_FORMAT, width, height);
        log::debug!("ember: back buffer resized to {width}x{height}");
    }

    /// Copies the back buffer to the CPU as tightly packed RGBA8 rows.
    pub fn read_back_buffer(&mut self) -> Result<Vec<u8>, GpuError> {
        let (width, height) = (self.back_buffer.width, self.back_buffer.height);
        let bpp = self
            .back_buffer
            .format
            .block_copy_size(None)
            .ok_or_else(|| GpuError::Backend("back buffer format has no copy size".to_string()))?;
        if bpp != 4 {
            return Err(GpuError::Backend(format!("cannot read back {:?}", self.back_buffer.format)));
        }
        let row = width * 4;
        let padded = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember_readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let encoder = encoder(&mut self.pending, &self.device);
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.back_buffer.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(padded), rows_per_image: Some(height) },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.submit();

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::Backend(e.to_string()))?
            .map_err(|e| GpuError::Backend(e.to_string()))?;

        let bgra = matches!(self.back_buffer.format, wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb);
        let mut pixels = Vec::with_capacity((row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for y in 0..height as usize {
                let start = y * padded as usize;
                pixels.extend_from_slice(&mapped[start..start + row as usize]);
            }
        }
        staging.unmap();
        if bgra {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        Ok(pixels)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.pending.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn sampler(&mut self, desc: SamplerDesc) {
        let device = &self.device;
        self.samplers.entry(desc).or_insert_with(|| device.create_sampler(&convert::sampler_descriptor(desc)));
    }

    fn clear_pass(&mut self, target: RenderTarget, color: [f32; 4]) -> Result<(), GpuError> {
        let view = match target {
            RenderTarget::BackBuffer => &self.back_buffer.view,
            RenderTarget::Texture(id) => &lookup(&self.textures, id, "render target")?.view,
        };
        let encoder = encoder(&mut self.pending, &self.device);
        let clear = wgpu::Color { r: color[0] as f64, g: color[1] as f64, b: color[2] as f64, a: color[3] as f64 };
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ember_clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(clear), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn encode_draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), GpuError> {
        let (vertex, pixel) = self.bound.programs.ok_or_else(|| GpuError::Draw("no programs bound".to_string()))?;
        if self.bound.targets.is_empty() {
            return Err(GpuError::Draw("no render targets bound".to_string()));
        }
        let sampler_desc = self.bound.sampler.unwrap_or(SamplerDesc::LINEAR_CLAMP);
        self.sampler(sampler_desc);

        let vertex_buffer = self
            .bound
            .vertex
            .ok_or_else(|| GpuError::Draw("no vertex buffer bound".to_string()))
            .and_then(|id| lookup(&self.buffers, id, "vertex buffer"))?;
        let mut views = Vec::with_capacity(self.bound.targets.len());
        let mut formats = Vec::with_capacity(self.bound.targets.len());
        let mut extent = (u32::MAX, u32::MAX);
        for target in &self.bound.targets {
            let image = match *target {
                RenderTarget::BackBuffer => &self.back_buffer,
                RenderTarget::Texture(id) => lookup(&self.textures, id, "render target")?,
            };
            views.push(&image.view);
            formats.push(image.format);
            extent = (extent.0.min(image.width), extent.1.min(image.height));
        }

        let Some((x, y, w, h)) = clamp_viewport(self.bound.viewport, extent) else {
            return Ok(());
        };
        let raster = self.bound.raster.unwrap_or(RasterDesc::FULL_SCREEN);
        let scissor = match (raster.scissor, self.bound.scissor) {
            (true, Some(rect)) => match clamp_scissor(rect, extent) {
                Some(r) => Some(r),
                None => return Ok(()),
            },
            _ => None,
        };
        let key = PipelineKey {
            vertex,
            pixel,
            blend: self.bound.blend.unwrap_or(BlendDesc::OPAQUE),
            depth: self.bound.depth.unwrap_or(DepthDesc::DISABLED),
            raster,
            topology: self.bound.topology.unwrap_or(PrimitiveTopology::TriangleList),
            targets: formats,
            depth_attached: self.bound.depth_attached,
        };

        let bind_group = {
            let uniforms: Vec<wgpu::BindingResource> = self
                .bound
                .constants
                .iter()
                .map(|slot| match slot.and_then(|id| self.buffers.get(&id)) {
                    Some(b) => b.buffer.as_entire_binding(),
                    None => self.fallback_uniform.as_entire_binding(),
                })
                .collect();
            let mut entries: Vec<wgpu::BindGroupEntry> = uniforms
                .into_iter()
                .enumerate()
                .map(|(binding, resource)| wgpu::BindGroupEntry { binding: binding as u32, resource })
                .collect();
            for (slot, texture) in self.bound.resources.iter().enumerate() {
                let view = texture
                    .and_then(|id| self.textures.get(&id))
                    .map_or(&self.fallback_texture.view, |image| &image.view);
                entries.push(wgpu::BindGroupEntry {
                    binding: FIRST_TEXTURE_BINDING + slot as u32,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            entries.push(wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.samplers[&sampler_desc]),
            });
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ember_bind_group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        };

        let pipeline = self.pipelines.get(&self.device, &key);
        let encoder = encoder(&mut self.pending, &self.device);
        let load = wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = views
            .into_iter()
            .map(|view| Some(wgpu::RenderPassColorAttachment { view, resolve_target: None, ops: load }))
            .collect();
        let depth_stencil_attachment = key.depth_attached.then(|| wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
            stencil_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ember_draw"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.set_vertex_buffer(0, vertex_buffer.buffer.slice(..));
        rp.set_viewport(x, y, w, h, 0.0, 1.0);
        if let Some(r) = scissor {
            rp.set_scissor_rect(r.x as u32, r.y as u32, r.width, r.height);
        }
        rp.draw(first_vertex..first_vertex + vertex_count, 0..1);
        Ok(())
    }
}

fn encoder<'a>(pending: &'a mut Option<wgpu::CommandEncoder>, device: &wgpu::Device) -> &'a mut wgpu::CommandEncoder {
    pending.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("ember_commands") })
    })
}

trait RawId: Copy + Eq + std::hash::Hash {
    fn raw(self) -> u32;
}

impl RawId for BufferId {
    fn raw(self) -> u32 {
        self.0
    }
}

impl RawId for TextureId {
    fn raw(self) -> u32 {
        self.0
    }
}

fn lookup<'a, K: RawId, V>(table: &'a HashMap<K, V>, id: K, kind: &'static str) -> Result<&'a V, GpuError> {
    table.get(&id).ok_or_else(|| GpuError::UnknownResource { kind, id: id.raw() })
}

fn write_level(queue: &wgpu::Queue, texture: &wgpu::Texture, level: u32, width: u32, height: u32, data: &[u8]) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(width * 4), rows_per_image: Some(height) },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

/// Viewport clipped to the attachment; `None` when nothing is left to draw.
fn clamp_viewport(viewport: Option<Viewport>, (width, height): (u32, u32)) -> Option<(f32, f32, f32, f32)> {
    let (tw, th) = (width as f32, height as f32);
    let v = viewport.unwrap_or_else(|| Viewport::new(0.0, 0.0, tw, th));
    let x = v.x.clamp(0.0, tw);
    let y = v.y.clamp(0.0, th);
    let w = v.width.min(tw - x);
    let h = v.height.min(th - y);
    (w >= 1.0 && h >= 1.0).then_some((x, y, w, h))
}

fn clamp_scissor(rect: ScissorRect, (width, height): (u32, u32)) -> Option<ScissorRect> {
    let x = rect.x.clamp(0, width as i32);
    let y = rect.y.clamp(0, height as i32);
    let right = (rect.x as i64 + rect.width as i64).clamp(0, width as i64) as i32;
    let bottom = (rect.y as i64 + rect.height as i64).clamp(0, height as i64) as i32;
    (right > x && bottom > y).then(|| ScissorRect { x, y, width: (right - x) as u32, height: (bottom - y) as u32 })
}

impl GpuExecutor for WgpuExecutor {
    fn back_buffer_size(&self) -> (u32, u32) {
        (self.back_buffer.width, self.back_buffer.height)
    }

    fn compile_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError> {
        // every program is an entry point of a module built at startup
        let id = ProgramId(self.next_id());
        self.programs.insert(id, kind);
        Ok(id)
    }

    fn release_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
    }

    fn bind_programs(&mut self, vertex: ProgramId, pixel: ProgramId) {
        match (self.programs.get(&vertex), self.programs.get(&pixel)) {
            (Some(&v), Some(&p)) => self.bound.programs = Some((v, p)),
            _ => log::warn!("ember: bind of unknown programs {vertex}/{pixel}"),
        }
    }

    fn create_state(&mut self, desc: &StateDesc) -> Result<StateId, GpuError> {
        if let StateDesc::Sampler(sampler) = *desc {
            self.sampler(sampler);
        }
        let id = StateId(self.next_id());
        self.states.insert(id, *desc);
        Ok(id)
    }

    fn bind_state(&mut self, id: StateId) {
        match self.states.get(&id) {
            Some(StateDesc::Depth(d)) => self.bound.depth = Some(*d),
            Some(StateDesc::Blend(b)) => self.bound.blend = Some(*b),
            Some(StateDesc::Raster(r)) => self.bound.raster = Some(*r),
            Some(StateDesc::Sampler(s)) => self.bound.sampler = Some(*s),
            None => log::warn!("ember: bind of unknown state {id}"),
        }
    }

    fn release_state(&mut self, id: StateId) {
        self.states.remove(&id);
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, GpuError> {
        let mut usage = wgpu::BufferUsages::COPY_DST;
        if desc.usage.contains(BufferUsage::CONSTANT) {
            usage |= wgpu::BufferUsages::UNIFORM;
        }
        if desc.usage.contains(BufferUsage::VERTEX) {
            usage |= wgpu::BufferUsages::VERTEX;
        }
        if desc.size == 0 {
            return Err(GpuError::creation("buffer", format!("{} has zero size", desc.label)));
        }
        // uniform blocks are 16-byte multiples
        let size = desc.size.next_multiple_of(16);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let id = BufferId(self.next_id());
        self.buffers.insert(id, Buffer { buffer, size: desc.size });
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), GpuError> {
        let size = lookup(&self.buffers, id, "buffer")?.size;
        if data.len() as u64 > size {
            return Err(GpuError::BufferOverflow { id: id.0, len: data.len(), size });
        }
        self.submit();
        let buffer = &self.buffers[&id].buffer;
        if data.len() % wgpu::COPY_BUFFER_ALIGNMENT as usize == 0 {
            self.queue.write_buffer(buffer, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize), 0);
            self.queue.write_buffer(buffer, 0, &padded);
        }
        Ok(())
    }

    fn bind_constant_buffer(&mut self, slot: u32, id: BufferId) {
        match self.bound.constants.get_mut(slot as usize) {
            Some(bound) => *bound = Some(id),
            None => log::warn!("ember: constant slot {slot} out of range"),
        }
    }

    fn bind_vertex_buffer(&mut self, id: BufferId) {
        self.bound.vertex = Some(id);
    }

    fn release_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn create_texture(&mut self, desc: &TextureDesc, levels: &[Vec<u8>]) -> Result<TextureId, GpuError> {
        let bpp = desc.format.bytes_per_pixel();
        let expected = desc.width as usize * desc.height as usize * bpp;
        match levels.first() {
            Some(base) if base.len() >= expected && expected > 0 => {}
            _ => return Err(GpuError::creation("texture", format!("{} needs {expected} bytes of level 0", desc.label))),
        }
        self.submit();
        let image = Image::new(
            &self.device,
            &wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
                mip_level_count: levels.len() as u32,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: convert::texture_format(desc.format),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
        );
        let (mut w, mut h) = (desc.width, desc.height);
        for (level, data) in levels.iter().enumerate() {
            let len = w as usize * h as usize * bpp;
            let Some(data) = data.get(..len) else {
                return Err(GpuError::creation("texture", format!("{} mip {level} is short", desc.label)));
            };
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &image.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(w * bpp as u32), rows_per_image: Some(h) },
                wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
            );
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        let id = TextureId(self.next_id());
        self.textures.insert(id, image);
        Ok(id)
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TextureId, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::creation("render target", format!("{} is {}x{}", desc.label, desc.width, desc.height)));
        }
        let image = Image::attachment(&self.device, desc.label, convert::texture_format(desc.format), desc.width, desc.height);
        let id = TextureId(self.next_id());
        self.textures.insert(id, image);
        Ok(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
        for slot in &mut self.bound.resources {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    fn bind_render_targets(&mut self, colors: &[RenderTarget], depth: bool) {
        self.bound.targets = colors.to_vec();
        self.bound.depth_attached = depth;
    }

    fn bind_shader_resources(&mut self, first_slot: u32, textures: &[Option<TextureId>]) {
        for (i, texture) in textures.iter().enumerate() {
            if let Some(slot) = self.bound.resources.get_mut(first_slot as usize + i) {
                *slot = *texture;
            }
        }
    }

    fn clear_render_target(&mut self, target: RenderTarget, color: [f32; 4]) {
        if let Err(e) = self.clear_pass(target, color) {
            log::warn!("ember: clear skipped: {e}");
        }
    }

    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8) {
        let encoder = encoder(&mut self.pending, &self.device);
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ember_clear_depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(depth), store: wgpu::StoreOp::Store }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(stencil as u32),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.bound.viewport = Some(viewport);
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        self.bound.scissor = Some(rect);
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.bound.topology = Some(topology);
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), GpuError> {
        if vertex_count == 0 {
            return Ok(());
        }
        self.encode_draw(vertex_count, first_vertex)
    }

    fn present(&mut self) -> Result<(), GpuError> {
        if self.window.is_none() {
            self.submit();
            self.frames += 1;
            return Ok(());
        }
        self.sampler(SamplerDesc::LINEAR_CLAMP);
        let frame = match &mut self.window {
            Some(window) => window.acquire(&self.device)?,
            None => return Ok(()),
        };
        let frame_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = {
            let mut entries: Vec<wgpu::BindGroupEntry> = (0..UNIFORM_SLOTS)
                .map(|binding| wgpu::BindGroupEntry { binding, resource: self.fallback_uniform.as_entire_binding() })
                .collect();
            for slot in 0..MAX_SHADER_RESOURCES as u32 {
                let view = if slot == 0 { &self.back_buffer.view } else { &self.fallback_texture.view };
                entries.push(wgpu::BindGroupEntry {
                    binding: FIRST_TEXTURE_BINDING + slot,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            entries.push(wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.samplers[&SamplerDesc::LINEAR_CLAMP]),
            });
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ember_present_bind_group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        };
        let encoder = encoder(&mut self.pending, &self.device);
        if let Some(window) = &self.window {
            window.blit(encoder, &bind_group, &frame_view);
        }
        self.submit();
        frame.present();
        self.frames += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
