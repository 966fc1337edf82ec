use thiserror::Error;

/// Failure reported by a GPU executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("failed to create {kind}: {reason}")]
    Creation { kind: &'static str, reason: String },

    #[error("unknown {kind} id {id}")]
    UnknownResource { kind: &'static str, id: u32 },

    #[error("write of {len} bytes exceeds buffer {id} ({size} bytes)")]
    BufferOverflow { id: u32, len: usize, size: u64 },

    #[error("surface error: {0}")]
    Surface(String),

    #[error("draw rejected: {0}")]
    Draw(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GpuError {
    pub fn creation(kind: &'static str, reason: impl Into<String>) -> Self {
        GpuError::Creation { kind, reason: reason.into() }
    }
}
