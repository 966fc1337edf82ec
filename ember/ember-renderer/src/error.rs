use render_api::GpuError;
use thiserror::Error;

/// Core failure. The public `Context` API records these as its last error instead of returning them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmberError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("no device bound")]
    NoDevice,

    #[error("invalid device handle {0}")]
    InvalidDevice(u32),

    #[error("invalid texture handle {0}")]
    InvalidTexture(u32),

    #[error("texture extent {width}x{height} must be non-zero")]
    EmptyTexture { width: u32, height: u32 },

    #[error("texture extent {width}x{height} overflows the addressable size")]
    TextureTooLarge { width: u32, height: u32 },

    #[error("pixel data holds {got} bytes, {expected} required")]
    ShortPixelData { expected: usize, got: usize },

    #[error("{0} rejected while a batch is open")]
    BatchOpen(&'static str),

    #[error("device table full")]
    DeviceLimit,
}

pub type EmberResult<T> = Result<T, EmberError>;
