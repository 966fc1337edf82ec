//! Ember Renderer: immediate-mode deferred shading over a `GpuExecutor`.
//! Batches begin/end vertex spans into a G-Buffer, accumulates ambient and point lights, then
//! composites bloom, blur and tone mapping onto the back buffer.

pub mod batch;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod gbuffer;
pub mod light_pass;
pub mod math;
pub mod pass;
pub mod post_process;
pub mod primitives;
pub mod resources;
pub mod state;
pub mod texture;
pub mod transform;
pub mod vertex;

pub use batch::Topology;
pub use config::EmberConfig;
pub use context::{Context, MAX_DEVICES};
pub use device::{Attributes, ClearFlags, Device};
pub use error::{EmberError, EmberResult};
pub use light_pass::LightDescriptor;
pub use math::{Matrix, Vec3};
pub use pass::Pass;
pub use state::Capabilities;
pub use texture::{Components, ElementType, PixelFormat, TextureFlags};
pub use vertex::Vertex;

pub use render_api::{BlendFactor, CompareFunc, FilterMode, FrontFace};
