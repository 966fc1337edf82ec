//! Trait for GPU executors (wgpu or the recording backend). The core issues every GPU command
//! through this trait and never touches a graphics API directly.

use std::any::Any;

use crate::error::GpuError;
use crate::types::{
    BufferDesc, BufferId, PrimitiveTopology, ProgramId, ProgramKind, RenderTarget, RenderTargetDesc,
    ScissorRect, StateDesc, StateId, TextureDesc, TextureId, Viewport,
};

/// Synchronous GPU command sink owned by one Ember device.
///
/// Calls are observed in order: a buffer written before a draw is the buffer that draw reads,
/// even if the backend pipelines the work internally.
pub trait GpuExecutor: Send {
    /// Size of the swap target in pixels.
    fn back_buffer_size(&self) -> (u32, u32);

    fn compile_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError>;
    fn release_program(&mut self, id: ProgramId);
    fn bind_programs(&mut self, vertex: ProgramId, pixel: ProgramId);

    fn create_state(&mut self, desc: &StateDesc) -> Result<StateId, GpuError>;
    /// Binds a state object; replaces whatever object of the same kind was bound.
    fn bind_state(&mut self, id: StateId);
    fn release_state(&mut self, id: StateId);

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, GpuError>;
    /// Map, copy `data` to offset 0, unmap.
    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), GpuError>;
    fn bind_constant_buffer(&mut self, slot: u32, id: BufferId);
    fn bind_vertex_buffer(&mut self, id: BufferId);
    fn release_buffer(&mut self, id: BufferId);

    /// Creates a sampled RGBA texture. `levels[0]` is the full-size image, each further entry the next mip.
    fn create_texture(&mut self, desc: &TextureDesc, levels: &[Vec<u8>]) -> Result<TextureId, GpuError>;
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TextureId, GpuError>;
    fn release_texture(&mut self, id: TextureId);

    fn bind_render_targets(&mut self, colors: &[RenderTarget], depth: bool);
    /// Binds textures to consecutive pixel-program slots starting at `first_slot`; `None` unbinds.
    fn bind_shader_resources(&mut self, first_slot: u32, textures: &[Option<TextureId>]);

    fn clear_render_target(&mut self, target: RenderTarget, color: [f32; 4]);
    fn clear_depth_stencil(&mut self, depth: f32, stencil: u8);

    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor(&mut self, rect: ScissorRect);
    fn set_topology(&mut self, topology: PrimitiveTopology);

    /// Non-indexed draw from the bound vertex buffer.
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<(), GpuError>;
    fn present(&mut self) -> Result<(), GpuError>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
