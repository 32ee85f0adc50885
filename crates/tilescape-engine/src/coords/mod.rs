//! Geometry types shared by the scene graph, the batcher and the tilemap.
//!
//! Canonical CPU space:
//! - pixels, origin top-left
//! - +X right, +Y down
//!
//! Backends convert to NDC using the active target size.

mod affine;
mod rect;
mod vec2;
mod viewport;

pub use affine::Affine;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
