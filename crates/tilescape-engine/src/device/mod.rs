//! GPU device layer.
//!
//! - [`GpuBackend`]: the seam the binder drives (textures, buffers,
//!   framebuffers, stencil, programs, draws)
//! - [`WgpuBackend`]: its wgpu implementation
//! - [`Gpu`]: instance/adapter/device/queue plus the window's swapchain

mod backend;
mod error;
mod frame;
mod gpu;
mod init;
mod surface;
mod vertex;
mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

pub use backend::{
    BufferKind, DrawCall, FilterMode, GpuBackend, Program, RawBuffer, RawFramebuffer, RawTexture,
    SamplerStyle, StencilOp, StencilState, TexelRegion, WrapMode,
};
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use vertex::{Vertex, FLAT_PAGE, QUAD_INDICES};
pub use wgpu_backend::WgpuBackend;
