//! Procedural tileset and sprite images, so the demo needs no files on disk.

use tilescape_engine::resource::ImageData;
use tilescape_engine::tilemap::tables::TILE_ID_A2;
use tilescape_engine::tilemap::{GridMap, SHADOW_LAYER};

pub const TILE: u32 = 48;

/// Plain tile ids placed on the decoration layer.
pub const ROCK: u32 = 1;
pub const FLOWER: u32 = 2;
/// Marked higher in the tileset flags; drawn above sprites.
pub const CANOPY: u32 = 3;

/// Flags indexed by tile id.
pub fn tileset_flags() -> Vec<u16> {
    let mut flags = vec![0u16; 8192];
    flags[CANOPY as usize] = tilescape_engine::tilemap::tables::FLAG_HIGHER;
    flags
}

/// A2 page: one grass floor autotile kind in the top-left block.
pub fn floor_page() -> ImageData {
    let mut img = ImageData::filled(16 * TILE, 12 * TILE, [0, 0, 0, 0]);
    // Kind 0 spans 2x3 tiles; the quadrant tables sample all of it.
    img.fill_rect(0, 0, 2 * TILE, 3 * TILE, [72, 140, 64, 255]);
    img.fill_rect(0, 0, 2 * TILE, 4, [52, 110, 48, 255]);
    img.fill_rect(0, TILE, 4, 2 * TILE, [52, 110, 48, 255]);
    img.fill_rect(2 * TILE - 4, TILE, 4, 2 * TILE, [52, 110, 48, 255]);
    img.fill_rect(0, 3 * TILE - 4, 2 * TILE, 4, [52, 110, 48, 255]);
    for i in 0..6 {
        img.fill_rect(10 + i * 13, TILE + 8 + (i % 3) * 21, 3, 3, [96, 170, 80, 255]);
    }
    img
}

/// B page: a handful of plain decorations.
pub fn decoration_page() -> ImageData {
    let mut img = ImageData::filled(16 * TILE, 16 * TILE, [0, 0, 0, 0]);
    let cell = |id: u32| (id % 8 * TILE, id / 8 * TILE);

    let (x, y) = cell(ROCK);
    img.fill_rect(x + 10, y + 18, 28, 20, [120, 120, 128, 255]);
    img.fill_rect(x + 14, y + 14, 18, 6, [150, 150, 158, 255]);

    let (x, y) = cell(FLOWER);
    img.fill_rect(x + 22, y + 26, 4, 14, [40, 120, 40, 255]);
    img.fill_rect(x + 18, y + 18, 12, 10, [220, 80, 120, 255]);

    let (x, y) = cell(CANOPY);
    img.fill_rect(x + 2, y + 2, 44, 44, [30, 90, 40, 230]);
    img
}

pub fn crystal() -> ImageData {
    let mut img = ImageData::filled(64, 64, [0, 0, 0, 0]);
    for row in 0..32u32 {
        let half = row;
        img.fill_rect(32 - half, row, half * 2, 1, [90, 160, 230, 255]);
        img.fill_rect(32 - half, 63 - row, half * 2, 1, [60, 110, 200, 255]);
    }
    img.fill_rect(28, 8, 8, 20, [200, 230, 255, 255]);
    img
}

/// A wrapping 40x30 meadow with deterministic scatter.
pub fn meadow() -> GridMap {
    let (w, h) = (40, 30);
    let mut map = GridMap::new(w, h);
    map.horizontal_wrap = true;
    map.vertical_wrap = true;
    map.fill_layer(0, TILE_ID_A2);

    for y in 0..h {
        for x in 0..w {
            let n = x * 7 + y * 13;
            if n % 11 == 0 {
                map.set(x, y, 2, ROCK);
            } else if n % 17 == 0 {
                map.set(x, y, 2, FLOWER);
            } else if n % 29 == 0 {
                map.set(x, y, 3, CANOPY);
                map.set(x, y, SHADOW_LAYER, 0b0101);
            }
        }
    }
    map
}
