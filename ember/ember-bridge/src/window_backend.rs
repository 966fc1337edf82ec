//! Window presentation: the surface the back buffer is blitted onto at present.

use render_api::GpuError;

use crate::pipeline::{Module, PipelineCache};

/// Configured window surface. The back buffer stays offscreen; `present` draws it onto the
/// current surface texture with the blit pipeline.
pub(crate) struct WindowSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    blit: wgpu::RenderPipeline,
}

impl WindowSurface {
    /// Picks a format (`preferred`, else the first non-sRGB one the surface offers) and configures.
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        pipelines: &PipelineCache,
        preferred: Option<wgpu::TextureFormat>,
        present_mode: wgpu::PresentMode,
        (width, height): (u32, u32),
    ) -> Result<Self, GpuError> {
        let caps = surface.get_capabilities(adapter);
        let format = preferred
            .filter(|f| caps.formats.contains(f))
            .or_else(|| caps.formats.iter().copied().find(|f| !f.is_srgb()))
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| GpuError::creation("surface", "adapter reports no surface formats"))?;
        let present_mode = if caps.present_modes.contains(&present_mode) {
            present_mode
        } else {
            log::warn!("ember: present mode {present_mode:?} unsupported, using Fifo");
            wgpu::PresentMode::Fifo
        };
        let config = Self::surface_config(format, present_mode, width, height);
        surface.configure(device, &config);
        let blit = create_blit_pipeline(device, pipelines, format);
        Ok(Self { surface, config, blit })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(device, &self.config);
    }

    /// Next surface texture, reconfiguring once when the surface went stale.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::SurfaceTexture, GpuError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                self.surface.configure(device, &self.config);
                self.surface.get_current_texture().map_err(|e| GpuError::Surface(e.to_string()))
            }
            Err(wgpu::SurfaceError::Timeout) => Err(GpuError::Surface("get_current_texture timeout".to_string())),
            Err(e) => Err(GpuError::Surface(e.to_string())),
        }
    }

    /// Draws `source` over the whole frame.
    pub fn blit(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, frame: &wgpu::TextureView) {
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ember_present"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.blit);
        rp.set_bind_group(0, bind_group, &[]);
        rp.draw(0..3, 0..1);
    }

    fn surface_config(
        format: wgpu::TextureFormat,
        present_mode: wgpu::PresentMode,
        width: u32,
        height: u32,
    ) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }
}

fn create_blit_pipeline(device: &wgpu::Device, pipelines: &PipelineCache, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
    let module = pipelines.shaders().module(Module::Post);
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("ember_present_pipeline"),
        layout: Some(pipelines.layout()),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_blit"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_blit"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
