use std::ops::Range;

use crate::device::{DrawCall, GpuBackend, Program, Vertex, FLAT_PAGE, QUAD_INDICES};
use crate::paint::Color;
use crate::pool::PoolRegistry;
use crate::resource::{Binder, Diagnostics, Geometry, TextureId, TextureStore};

/// Tileset pages a tilemap samples: A1..A5 then B..E.
pub const PAGE_COUNT: usize = 9;

/// Texture a tile quad is drawn from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TilePage {
    /// Index into the tilemap's pages.
    Set(u8),
    /// Untextured shadow quadrant.
    Shadow,
}

/// One quad before expansion: source texels on its page, destination
/// pixels relative to the layer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileQuad {
    pub page: TilePage,
    pub src: [f32; 4],
    pub dst: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
struct PageRange {
    page: TilePage,
    indices: Range<u32>,
}

/// Quads of one tilemap layer and the geometry they are built into.
///
/// Quads are collected during a repaint in paint order, then
/// [`build`](Self::build) writes vertex and index bytes once. Paint order
/// is never changed; consecutive quads on the same page share a draw.
#[derive(Debug)]
pub struct TileLayer {
    quads: Vec<TileQuad>,
    geometry: Geometry,
    ranges: Vec<PageRange>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl TileLayer {
    pub(crate) fn new(geometry: Geometry) -> Self {
        Self {
            quads: Vec::new(),
            geometry,
            ranges: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    #[inline]
    pub fn quads(&self) -> &[TileQuad] {
        &self.quads
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Number of page runs, i.e. draw calls the built layer issues.
    #[inline]
    pub fn draw_count(&self) -> usize {
        self.ranges.len()
    }

    pub(crate) fn clear(&mut self) {
        self.quads.clear();
        self.ranges.clear();
    }

    #[inline]
    pub(crate) fn push(&mut self, page: TilePage, src: [f32; 4], dst: [f32; 4]) {
        self.quads.push(TileQuad { page, src, dst });
    }

    /// Expands quads into the layer's geometry, opening a new page run
    /// whenever the page differs from the previous quad's.
    pub(crate) fn build(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.ranges.clear();

        for quad in &self.quads {
            let first = self.indices.len() as u32;
            match self.ranges.last_mut() {
                Some(range) if range.page == quad.page => range.indices.end = first + 6,
                _ => self.ranges.push(PageRange {
                    page: quad.page,
                    indices: first..first + 6,
                }),
            }
            let (color, page) = match quad.page {
                TilePage::Set(s) => (Color::WHITE, s as f32),
                TilePage::Shadow => (Color::SHADOW, FLAT_PAGE),
            };
            let base = self.vertices.len() as u32;
            self.vertices
                .extend_from_slice(&Vertex::quad(quad.dst, quad.src, color.to_array(), page));
            self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
        }

        self.geometry.vertices.set_data(bytemuck::cast_slice(&self.vertices));
        self.geometry.indices.set_data(bytemuck::cast_slice(&self.indices));
    }

    /// One draw per page run, in paint order. Runs whose page has no
    /// texture are skipped.
    pub(crate) fn draw<B: GpuBackend>(
        &mut self,
        pages: &[Option<TextureId>; PAGE_COUNT],
        translate: [f32; 2],
        binder: &mut Binder<B>,
        textures: &mut TextureStore,
        diag: &mut Diagnostics,
    ) {
        if self.ranges.is_empty() {
            return;
        }
        let mut geometry_bound = false;
        for range in &self.ranges {
            match range.page {
                TilePage::Set(s) => {
                    let Some(texture) = pages.get(s as usize).copied().flatten() else {
                        continue;
                    };
                    binder.bind_texture(0, textures, Some(texture), diag);
                }
                TilePage::Shadow => {
                    binder.bind_placeholder(0, diag);
                }
            }
            if !geometry_bound {
                if !binder.bind_geometry(&mut self.geometry, diag) {
                    return;
                }
                geometry_bound = true;
            }
            binder.set_program(Program::Textured);
            binder.draw(DrawCall {
                indices: range.indices.clone(),
                base_vertex: 0,
                translate,
            });
        }
    }

    pub(crate) fn recycle(self, pools: &mut PoolRegistry) {
        pools.release(self.geometry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{Call, RecordingBackend};
    use crate::resource::ImageData;

    fn layer() -> TileLayer {
        TileLayer::new(Geometry::new())
    }

    fn src(x: f32) -> [f32; 4] {
        [x, 0.0, 48.0, 48.0]
    }

    #[test]
    fn build_keeps_paint_order_and_splits_page_runs() {
        let mut l = layer();
        l.push(TilePage::Set(4), src(0.0), src(0.0));
        l.push(TilePage::Set(1), src(1.0), src(0.0));
        l.push(TilePage::Set(1), src(2.0), src(0.0));
        l.push(TilePage::Shadow, src(0.0), src(0.0));
        l.push(TilePage::Set(1), src(3.0), src(0.0));

        l.build();

        let pages: Vec<_> = l.quads().iter().map(|q| q.page).collect();
        assert_eq!(
            pages,
            [
                TilePage::Set(4),
                TilePage::Set(1),
                TilePage::Set(1),
                TilePage::Shadow,
                TilePage::Set(1)
            ]
        );
        let ranges: Vec<_> = l.ranges.iter().map(|r| r.indices.clone()).collect();
        assert_eq!(ranges, [0..6, 6..18, 18..24, 24..30]);
        assert_eq!(l.draw_count(), 4);
        assert_eq!(l.geometry.index_count(), 30);
    }

    #[test]
    fn draws_once_per_page_run_from_one_upload() {
        let mut l = layer();
        for i in 0..10 {
            let page = if i < 5 { TilePage::Set(1) } else { TilePage::Set(6) };
            l.push(page, src(0.0), src(i as f32 * 48.0));
        }
        l.build();

        let mut binder = Binder::new(RecordingBackend::new());
        let mut store = TextureStore::new();
        let mut diag = Diagnostics::new();
        let mut pages = [None; PAGE_COUNT];
        pages[1] = Some(store.create_from_image(ImageData::filled(96, 96, [255; 4])));
        pages[6] = Some(store.create_from_image(ImageData::filled(96, 96, [255; 4])));

        l.draw(&pages, [10.0, -5.0], &mut binder, &mut store, &mut diag);
        l.draw(&pages, [10.0, -5.0], &mut binder, &mut store, &mut diag);

        let backend = binder.backend();
        let draws = backend.draws();
        assert_eq!(draws.len(), 4);
        assert_eq!(draws[0].indices, 0..30);
        assert_eq!(draws[1].indices, 30..60);
        assert_eq!(draws[0].translate, [10.0, -5.0]);
        assert_eq!(backend.count(|c| matches!(c, Call::WriteBuffer { .. })), 2);
    }

    #[test]
    fn pages_without_texture_are_skipped() {
        let mut l = layer();
        l.push(TilePage::Set(7), src(0.0), src(0.0));
        l.push(TilePage::Shadow, src(0.0), src(48.0));
        l.build();

        let mut binder = Binder::new(RecordingBackend::new());
        let mut diag = Diagnostics::new();
        l.draw(
            &[None; PAGE_COUNT],
            [0.0, 0.0],
            &mut binder,
            &mut TextureStore::new(),
            &mut diag,
        );

        let draws = binder.backend().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices, 0..6);
    }
}
