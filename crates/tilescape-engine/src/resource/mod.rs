//! GPU resource lifecycle.
//!
//! CPU-side owners ([`TextureStore`], [`GpuBuffer`], [`Geometry`],
//! [`RenderTargetPool`]) hold versions; the [`Binder`] compares them with
//! what the device has and issues only the calls that close the gap.
//!
//! Storage is created on first use, kept across pool reuse and retirement,
//! and destroyed only on drain. A context loss bumps the binder's
//! generation; storage tagged with an older generation is forgotten
//! without device calls and re-created on next use.

mod binder;
mod buffer;
mod diagnostics;
mod render_target;
mod target_pool;
mod texture;

pub use binder::{Binder, BinderStats, Bound, TEXTURE_UNITS};
pub use buffer::{Geometry, GpuBuffer};
pub use diagnostics::{DiagnosticCounts, Diagnostics};
pub use render_target::{
    RenderTarget, RenderTargetId, RenderTargetPool, TargetPoolStats, TargetStorage,
};
pub use target_pool::{bucket_size, FilterTargetPool};
pub use texture::{ImageData, Texture, TextureId, TextureStore};
