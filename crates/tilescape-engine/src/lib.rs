//! Tilescape engine crate.
//!
//! A 2D retained-mode renderer: a scene graph of sprites, fills and tile
//! grids, drawn in batches through a state-caching binder, with masks,
//! filter passes and a chrome-clipping window layer. The platform runtime
//! drives it on top of `winit` and `wgpu`.

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod paint;
pub mod error;
pub mod pool;
pub mod resource;
pub mod context;
pub mod scene;
pub mod tilemap;
