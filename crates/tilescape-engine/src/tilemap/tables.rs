//! Tile id ranges and autotile quadrant tables.
//!
//! Ids index a fixed tileset layout: plain sets B..E and A5 hold 256 or
//! 128 tiles each; A1..A4 hold autotiles as 48 consecutive shapes per kind.

pub const TILE_ID_B: u32 = 0;
pub const TILE_ID_C: u32 = 256;
pub const TILE_ID_D: u32 = 512;
pub const TILE_ID_E: u32 = 768;
pub const TILE_ID_A5: u32 = 1536;
pub const TILE_ID_A1: u32 = 2048;
pub const TILE_ID_A2: u32 = 2816;
pub const TILE_ID_A3: u32 = 4352;
pub const TILE_ID_A4: u32 = 5888;
pub const TILE_ID_MAX: u32 = 8192;

/// Shapes per autotile kind.
pub const SHAPES_PER_KIND: u32 = 48;

/// Tileset flag: drawn on the upper layer.
pub const FLAG_HIGHER: u16 = 0x10;
/// Tileset flag: A2 tile rendered as a table with a front edge.
pub const FLAG_TABLE: u16 = 0x80;

#[inline]
pub fn is_visible_tile(id: u32) -> bool {
    id > 0 && id < TILE_ID_MAX
}

#[inline]
pub fn is_autotile(id: u32) -> bool {
    id >= TILE_ID_A1
}

#[inline]
pub fn autotile_kind(id: u32) -> u32 {
    (id - TILE_ID_A1) / SHAPES_PER_KIND
}

#[inline]
pub fn autotile_shape(id: u32) -> u32 {
    (id - TILE_ID_A1) % SHAPES_PER_KIND
}

#[inline]
pub fn is_tile_a1(id: u32) -> bool {
    (TILE_ID_A1..TILE_ID_A2).contains(&id)
}

#[inline]
pub fn is_tile_a2(id: u32) -> bool {
    (TILE_ID_A2..TILE_ID_A3).contains(&id)
}

#[inline]
pub fn is_tile_a3(id: u32) -> bool {
    (TILE_ID_A3..TILE_ID_A4).contains(&id)
}

#[inline]
pub fn is_tile_a4(id: u32) -> bool {
    (TILE_ID_A4..TILE_ID_MAX).contains(&id)
}

#[inline]
pub fn is_tile_a5(id: u32) -> bool {
    (TILE_ID_A5..TILE_ID_A1).contains(&id)
}

/// Odd A1 kinds from the fifth onwards animate as waterfalls.
pub fn is_waterfall_tile(id: u32) -> bool {
    id >= TILE_ID_A1 + 192 && id < TILE_ID_A2 && autotile_kind(id) % 2 == 1
}

/// Roofs and walls cast the shadow that suppresses a table edge below.
pub fn is_shadowing_tile(id: u32) -> bool {
    is_tile_a3(id) || is_tile_a4(id)
}

/// Source offsets, in half tiles, of the four quadrants of one shape:
/// top-left, top-right, bottom-left, bottom-right.
pub type QuadrantTable = [[u8; 2]; 4];

pub const FLOOR_AUTOTILE_TABLE: [QuadrantTable; 48] = [
    [[2, 4], [1, 4], [2, 3], [1, 3]],
    [[2, 0], [1, 4], [2, 3], [1, 3]],
    [[2, 4], [3, 0], [2, 3], [1, 3]],
    [[2, 0], [3, 0], [2, 3], [1, 3]],
    [[2, 4], [1, 4], [2, 3], [3, 1]],
    [[2, 0], [1, 4], [2, 3], [3, 1]],
    [[2, 4], [3, 0], [2, 3], [3, 1]],
    [[2, 0], [3, 0], [2, 3], [3, 1]],
    [[2, 4], [1, 4], [2, 1], [1, 3]],
    [[2, 0], [1, 4], [2, 1], [1, 3]],
    [[2, 4], [3, 0], [2, 1], [1, 3]],
    [[2, 0], [3, 0], [2, 1], [1, 3]],
    [[2, 4], [1, 4], [2, 1], [3, 1]],
    [[2, 0], [1, 4], [2, 1], [3, 1]],
    [[2, 4], [3, 0], [2, 1], [3, 1]],
    [[2, 0], [3, 0], [2, 1], [3, 1]],
    [[0, 4], [1, 4], [0, 3], [1, 3]],
    [[0, 4], [3, 0], [0, 3], [1, 3]],
    [[0, 4], [1, 4], [0, 3], [3, 1]],
    [[0, 4], [3, 0], [0, 3], [3, 1]],
    [[2, 2], [1, 2], [2, 3], [1, 3]],
    [[2, 2], [1, 2], [2, 3], [3, 1]],
    [[2, 2], [1, 2], [2, 1], [1, 3]],
    [[2, 2], [1, 2], [2, 1], [3, 1]],
    [[2, 4], [3, 4], [2, 3], [3, 3]],
    [[2, 4], [3, 4], [2, 1], [3, 3]],
    [[2, 0], [3, 4], [2, 3], [3, 3]],
    [[2, 0], [3, 4], [2, 1], [3, 3]],
    [[2, 4], [1, 4], [2, 5], [1, 5]],
    [[2, 0], [1, 4], [2, 5], [1, 5]],
    [[2, 4], [3, 0], [2, 5], [1, 5]],
    [[2, 0], [3, 0], [2, 5], [1, 5]],
    [[0, 4], [3, 4], [0, 3], [3, 3]],
    [[2, 2], [1, 2], [2, 5], [1, 5]],
    [[0, 2], [1, 2], [0, 3], [1, 3]],
    [[0, 2], [1, 2], [0, 3], [3, 1]],
    [[2, 2], [3, 2], [2, 3], [3, 3]],
    [[2, 2], [3, 2], [2, 1], [3, 3]],
    [[2, 4], [3, 4], [2, 5], [3, 5]],
    [[2, 0], [3, 4], [2, 5], [3, 5]],
    [[0, 4], [1, 4], [0, 5], [1, 5]],
    [[0, 4], [3, 0], [0, 5], [1, 5]],
    [[0, 2], [3, 2], [0, 3], [3, 3]],
    [[0, 2], [1, 2], [0, 5], [1, 5]],
    [[0, 4], [3, 4], [0, 5], [3, 5]],
    [[2, 2], [3, 2], [2, 5], [3, 5]],
    [[0, 2], [3, 2], [0, 5], [3, 5]],
    [[0, 0], [1, 0], [0, 1], [1, 1]],
];

pub const WALL_AUTOTILE_TABLE: [QuadrantTable; 16] = [
    [[2, 2], [1, 2], [2, 1], [1, 1]],
    [[0, 2], [1, 2], [0, 1], [1, 1]],
    [[2, 0], [1, 0], [2, 1], [1, 1]],
    [[0, 0], [1, 0], [0, 1], [1, 1]],
    [[2, 2], [3, 2], [2, 1], [3, 1]],
    [[0, 2], [3, 2], [0, 1], [3, 1]],
    [[2, 0], [3, 0], [2, 1], [3, 1]],
    [[0, 0], [3, 0], [0, 1], [3, 1]],
    [[2, 2], [1, 2], [2, 3], [1, 3]],
    [[0, 2], [1, 2], [0, 3], [1, 3]],
    [[2, 0], [1, 0], [2, 3], [1, 3]],
    [[0, 0], [1, 0], [0, 3], [1, 3]],
    [[2, 2], [3, 2], [2, 3], [3, 3]],
    [[0, 2], [3, 2], [0, 3], [3, 3]],
    [[2, 0], [3, 0], [2, 3], [3, 3]],
    [[0, 0], [3, 0], [0, 3], [3, 3]],
];

pub const WATERFALL_AUTOTILE_TABLE: [QuadrantTable; 4] = [
    [[2, 0], [1, 0], [2, 1], [1, 1]],
    [[0, 0], [1, 0], [0, 1], [1, 1]],
    [[2, 0], [3, 0], [2, 1], [3, 1]],
    [[0, 0], [3, 0], [0, 1], [3, 1]],
];
