use crate::coords::{Vec2, Viewport};
use crate::device::GpuBackend;
use crate::error::RenderResult;
use crate::pool::PoolRegistry;
use crate::resource::{Binder, Diagnostics, Geometry, TextureId, TextureStore};

use super::decode::{add_shadow, add_table_edge, add_tile, DecodeParams};
use super::layer::{TileLayer, PAGE_COUNT};
use super::map::{MapData, SHADOW_LAYER};
use super::tables::is_shadowing_tile;

/// Tilemap construction parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TilemapConfig {
    pub tile_width: f32,
    pub tile_height: f32,
    /// Extra pixels painted around the viewport so small scrolls reuse the
    /// current batch.
    pub margin: f32,
    pub viewport: Viewport,
    /// Updates per animation frame.
    pub animation_interval: u32,
}

impl Default for TilemapConfig {
    fn default() -> Self {
        Self {
            tile_width: 48.0,
            tile_height: 48.0,
            margin: 20.0,
            viewport: Viewport::new(816.0, 624.0),
            animation_interval: 30,
        }
    }
}

/// Which of the two batches to draw: below or above the node's children.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TileLayerKind {
    Lower,
    Upper,
}

/// Totals of the last repaint.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PaintStats {
    pub cells: u64,
    pub lower_quads: u64,
    pub upper_quads: u64,
    /// Ids that could not be decoded.
    pub skipped: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct PaintKey {
    start_x: i32,
    start_y: i32,
    animation_frame: u64,
    cols: i32,
    rows: i32,
}

/// Batches the visible window of a tile grid into two layers of quads.
///
/// The window is repainted only when its first cell, the animation frame or
/// the viewport changes, or after [`invalidate`](Self::invalidate);
/// otherwise both layers are redrawn from geometry already on the device.
/// Only the node's translation applies to tilemaps.
pub struct TileRenderer {
    config: TilemapConfig,
    map: Box<dyn MapData>,
    flags: Vec<u16>,
    pages: [Option<TextureId>; PAGE_COUNT],
    origin: Vec2,
    animation_count: u64,
    lower: TileLayer,
    upper: TileLayer,
    needs_repaint: bool,
    last_paint: Option<PaintKey>,
    layer_offset: Vec2,
    rebuild_count: u64,
    paint_stats: PaintStats,
}

impl core::fmt::Debug for TileRenderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileRenderer")
            .field("config", &self.config)
            .field("origin", &self.origin)
            .field("rebuild_count", &self.rebuild_count)
            .finish_non_exhaustive()
    }
}

impl TileRenderer {
    /// Creates a tilemap whose layer geometries come from `pools`.
    pub fn new(config: TilemapConfig, map: Box<dyn MapData>, pools: &mut PoolRegistry) -> Self {
        Self {
            config,
            map,
            flags: Vec::new(),
            pages: [None; PAGE_COUNT],
            origin: Vec2::ZERO,
            animation_count: 0,
            lower: TileLayer::new(pools.acquire::<Geometry>()),
            upper: TileLayer::new(pools.acquire::<Geometry>()),
            needs_repaint: true,
            last_paint: None,
            layer_offset: Vec2::ZERO,
            rebuild_count: 0,
            paint_stats: PaintStats::default(),
        }
    }

    // ── host control ──────────────────────────────────────────────────────

    /// Scroll position of the viewport's top-left corner, in map pixels.
    pub fn set_scroll_origin(&mut self, x: f32, y: f32) {
        let origin = Vec2::new(x, y);
        if origin.is_finite() {
            self.origin = origin;
        } else {
            log::warn!("ignoring non-finite scroll origin {origin:?}");
        }
    }

    #[inline]
    pub fn scroll_origin(&self) -> Vec2 {
        self.origin
    }

    /// Forces a repaint on the next frame.
    pub fn invalidate(&mut self) {
        self.needs_repaint = true;
    }

    /// Advances the animation by one tick.
    pub fn update(&mut self) {
        self.animation_count += 1;
    }

    #[inline]
    pub fn animation_frame(&self) -> u64 {
        self.animation_count / u64::from(self.config.animation_interval.max(1))
    }

    pub fn set_map(&mut self, map: Box<dyn MapData>) {
        self.map = map;
        self.needs_repaint = true;
    }

    /// Mutable access to the map; the next frame repaints.
    pub fn map_mut(&mut self) -> &mut dyn MapData {
        self.needs_repaint = true;
        self.map.as_mut()
    }

    /// Per-id tileset flags (`FLAG_HIGHER`, `FLAG_TABLE`).
    pub fn set_flags(&mut self, flags: Vec<u16>) {
        self.flags = flags;
        self.needs_repaint = true;
    }

    /// Texture of tileset page `index` (A1..A5, B..E). Pages without a
    /// texture are not drawn.
    pub fn set_page(&mut self, index: usize, texture: Option<TextureId>) {
        match self.pages.get_mut(index) {
            Some(slot) => *slot = texture,
            None => log::warn!("tileset page {index} out of range"),
        }
    }

    pub fn resize_viewport(&mut self, viewport: Viewport) {
        if !viewport.is_valid() {
            log::warn!("ignoring invalid tilemap viewport {viewport:?}");
            return;
        }
        self.config.viewport = viewport;
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.config.viewport
    }

    #[inline]
    pub fn config(&self) -> &TilemapConfig {
        &self.config
    }

    /// Repaints since creation.
    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    #[inline]
    pub fn paint_stats(&self) -> PaintStats {
        self.paint_stats
    }

    pub fn layer(&self, kind: TileLayerKind) -> &TileLayer {
        match kind {
            TileLayerKind::Lower => &self.lower,
            TileLayerKind::Upper => &self.upper,
        }
    }

    /// Offset of the layers' local origin from the node's position.
    #[inline]
    pub fn layer_offset(&self) -> Vec2 {
        self.layer_offset
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Repaints both layers if the window changed.
    pub fn prepare(&mut self, diag: &mut Diagnostics) {
        let (tw, th) = (self.config.tile_width, self.config.tile_height);
        if tw <= 0.0 || th <= 0.0 {
            return;
        }
        let margin = self.config.margin;
        let origin = self.origin.floor();
        let start_x = ((origin.x - margin) / tw).floor() as i32;
        let start_y = ((origin.y - margin) / th).floor() as i32;
        let vp = self.config.viewport;
        let key = PaintKey {
            start_x,
            start_y,
            animation_frame: self.animation_frame(),
            cols: ((vp.width + 2.0 * margin) / tw).ceil() as i32 + 1,
            rows: ((vp.height + 2.0 * margin) / th).ceil() as i32 + 1,
        };
        self.layer_offset = Vec2::new(
            start_x as f32 * tw - origin.x,
            start_y as f32 * th - origin.y,
        );

        if self.needs_repaint || self.last_paint != Some(key) {
            self.paint(key, diag);
            self.last_paint = Some(key);
            self.needs_repaint = false;
        }
    }

    fn paint(&mut self, key: PaintKey, diag: &mut Diagnostics) {
        self.lower.clear();
        self.upper.clear();
        let mut stats = PaintStats::default();
        let params = DecodeParams {
            tile_width: self.config.tile_width,
            tile_height: self.config.tile_height,
            animation_frame: key.animation_frame,
            flags: &self.flags,
        };

        for y in 0..key.rows {
            for x in 0..key.cols {
                let (mx, my) = (key.start_x + x, key.start_y + y);
                let dx = x as f32 * params.tile_width;
                let dy = y as f32 * params.tile_height;
                stats.cells += 1;
                paint_cell(
                    self.map.as_ref(),
                    (mx, my),
                    (dx, dy),
                    &params,
                    &mut self.lower,
                    &mut self.upper,
                    diag,
                    &mut stats.skipped,
                );
            }
        }

        self.lower.build();
        self.upper.build();
        stats.lower_quads = self.lower.len() as u64;
        stats.upper_quads = self.upper.len() as u64;
        self.paint_stats = stats;
        self.rebuild_count += 1;
        log::trace!(
            "tilemap repaint #{}: {} cells, {}+{} quads",
            self.rebuild_count,
            stats.cells,
            stats.lower_quads,
            stats.upper_quads
        );
    }

    /// Draws one layer with the node's translation `origin`.
    pub fn draw<B: GpuBackend>(
        &mut self,
        kind: TileLayerKind,
        origin: Vec2,
        binder: &mut Binder<B>,
        textures: &mut TextureStore,
        diag: &mut Diagnostics,
    ) {
        let translate = [origin.x + self.layer_offset.x, origin.y + self.layer_offset.y];
        let layer = match kind {
            TileLayerKind::Lower => &mut self.lower,
            TileLayerKind::Upper => &mut self.upper,
        };
        layer.draw(&self.pages, translate, binder, textures, diag);
    }

    /// Hands both layer geometries back to `pools`.
    pub fn recycle(self: Box<Self>, pools: &mut PoolRegistry) {
        let this = *self;
        this.lower.recycle(pools);
        this.upper.recycle(pools);
    }
}

/// Layers 0 and 1 by flag, shadow, table edge, then layers 2 and 3.
#[allow(clippy::too_many_arguments)]
fn paint_cell(
    map: &dyn MapData,
    (mx, my): (i32, i32),
    (dx, dy): (f32, f32),
    params: &DecodeParams<'_>,
    lower: &mut TileLayer,
    upper: &mut TileLayer,
    diag: &mut Diagnostics,
    skipped: &mut u64,
) {
    let ids = [0, 1, 2, 3].map(|layer| map.read_cell(mx, my, layer));
    let shadow_bits = map.read_cell(mx, my, SHADOW_LAYER);
    let upper_id1 = map.read_cell(mx, my - 1, 1);

    let mut report = |result: RenderResult<()>| {
        if let Err(err) = result {
            *skipped += 1;
            diag.report(err);
        }
    };

    for &id in &ids[..2] {
        let layer = if params.is_higher_tile(id) { &mut *upper } else { &mut *lower };
        report(add_tile(layer, id, dx, dy, params));
    }

    add_shadow(lower, shadow_bits, dx, dy, params);

    if params.is_table_tile(upper_id1)
        && !params.is_table_tile(ids[1])
        && !is_shadowing_tile(ids[0])
    {
        report(add_table_edge(lower, upper_id1, dx, dy, params));
    }

    let overpass = map.is_overpass(mx, my);
    for &id in &ids[2..] {
        let layer = if overpass || params.is_higher_tile(id) { &mut *upper } else { &mut *lower };
        report(add_tile(layer, id, dx, dy, params));
    }
}
