//! Color model shared by the batcher, the tilemap and the backends.
//!
//! Colors are linear premultiplied RGBA; the blend state of every pipeline
//! assumes premultiplied input.

mod color;

pub use color::Color;
