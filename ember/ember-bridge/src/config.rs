//! Bridge configuration: presentation and optional device features.

/// Settings for a `WgpuExecutor`.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Present mode for window surfaces.
    pub present_mode: wgpu::PresentMode,
    /// Back buffer format. `None` picks the first non-sRGB format the surface supports
    /// (Rgba8Unorm when headless).
    pub back_buffer_format: Option<wgpu::TextureFormat>,
    /// Request `POLYGON_MODE_LINE` so wireframe raster states draw lines. Falls back to fill
    /// when the adapter lacks it.
    pub wireframe: bool,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            present_mode: wgpu::PresentMode::Fifo,
            back_buffer_format: None,
            wireframe: true,
            power_preference: wgpu::PowerPreference::default(),
        }
    }
}
