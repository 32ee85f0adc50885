//! Batched tile grid rendering.
//!
//! A [`TileRenderer`] reads cells through [`MapData`], decodes each of the
//! four stacked ids (plain tiles and 48-shape autotiles) into quads, and
//! keeps them in a lower and an upper [`TileLayer`]. Each layer is uploaded
//! once per repaint and drawn in paint order, one call per run of quads
//! sharing a tileset page.

mod decode;
mod layer;
mod map;
mod renderer;
pub mod tables;

pub use layer::{TileLayer, TilePage, TileQuad, PAGE_COUNT};
pub use map::{GridMap, MapData, MAP_LAYERS, SHADOW_LAYER};
pub use renderer::{PaintStats, TileLayerKind, TileRenderer, TilemapConfig};
