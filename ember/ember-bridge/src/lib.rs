//! Ember bridge: a wgpu implementation of `render_api::GpuExecutor`.
//!
//! `WgpuExecutor::headless` renders offscreen (read the result with `read_back_buffer`);
//! `WgpuExecutor::from_window` presents the back buffer to a window surface on every swap.

mod config;
mod convert;
mod executor;
mod pipeline;
mod window_backend;

pub use config::BridgeConfig;
pub use executor::WgpuExecutor;
