//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and wires them to the GPU layer
//! and the process-wide render context.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
