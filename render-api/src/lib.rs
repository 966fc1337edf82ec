//! GPU executor capability shared by the Ember core and its backends.
//! Defines the resource descriptors and the GpuExecutor trait so the core can drive wgpu
//! (ember-bridge) or the in-memory RecordingExecutor with the same code path.

mod backend;
mod error;
mod recording;
mod types;

pub use backend::GpuExecutor;
pub use error::GpuError;
pub use recording::{Call, DrawRecord, RecordingExecutor, Released};
pub use types::{
    AddressMode, BlendDesc, BlendFactor, BufferDesc, BufferId, BufferUsage, CompareFunc, DepthDesc,
    FilterMode, FrontFace, PrimitiveTopology, ProgramId, ProgramKind, RasterDesc, RenderTarget,
    RenderTargetDesc, SamplerDesc, ScissorRect, StateDesc, StateId, TextureDesc, TextureFormat,
    TextureId, Viewport, MAX_SHADER_RESOURCES,
};
