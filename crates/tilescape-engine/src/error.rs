//! Renderer error taxonomy.
//!
//! None of these abort a frame. They are collected by
//! [`Diagnostics`](crate::resource::Diagnostics) and drained by the host;
//! setup-time failures (device, window) use `anyhow` instead.

use thiserror::Error;

/// Kind of device resource involved in an allocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
    Framebuffer,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A pooled object was released that the pool never handed out, or a
    /// pooled handle was released twice.
    #[error("pool contract violated for {type_name}: {detail}")]
    PoolContractViolation {
        type_name: &'static str,
        detail: &'static str,
    },

    /// Device storage could not be allocated; the resource falls back to the
    /// placeholder until its next successful upload.
    #[error("failed to allocate {kind:?} storage ({width}x{height}): {reason}")]
    AllocationFailed {
        kind: ResourceKind,
        width: u32,
        height: u32,
        reason: String,
    },

    /// The device was lost; every resource is re-created lazily on next use.
    #[error("graphics context lost")]
    ContextLost,

    /// A tile id or autotile shape fell outside the known tables.
    #[error("tile id {tile_id} is outside the decodable range")]
    DecodeOutOfRange { tile_id: u32 },
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
