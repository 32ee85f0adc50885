//! Tile id → quads.

use crate::error::{RenderError, RenderResult};

use super::layer::{TileLayer, TilePage};
use super::tables::*;

/// Everything decoding depends on besides the id and position.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DecodeParams<'a> {
    pub tile_width: f32,
    pub tile_height: f32,
    pub animation_frame: u64,
    pub flags: &'a [u16],
}

impl DecodeParams<'_> {
    fn flag(&self, id: u32) -> u16 {
        self.flags.get(id as usize).copied().unwrap_or(0)
    }

    pub fn is_higher_tile(&self, id: u32) -> bool {
        self.flag(id) & FLAG_HIGHER != 0
    }

    pub fn is_table_tile(&self, id: u32) -> bool {
        is_tile_a2(id) && self.flag(id) & FLAG_TABLE != 0
    }
}

/// Emits the quads of one tile at `(dx, dy)`. Id 0 emits nothing.
pub(crate) fn add_tile(
    layer: &mut TileLayer,
    id: u32,
    dx: f32,
    dy: f32,
    params: &DecodeParams<'_>,
) -> RenderResult<()> {
    if id == 0 {
        return Ok(());
    }
    if !is_visible_tile(id) {
        return Err(RenderError::DecodeOutOfRange { tile_id: id });
    }
    if is_autotile(id) {
        add_autotile(layer, id, dx, dy, params)
    } else {
        add_normal_tile(layer, id, dx, dy, params)
    }
}

fn add_normal_tile(
    layer: &mut TileLayer,
    id: u32,
    dx: f32,
    dy: f32,
    params: &DecodeParams<'_>,
) -> RenderResult<()> {
    let set = if is_tile_a5(id) { 4 } else { 5 + id / 256 };
    if set > 8 {
        return Err(RenderError::DecodeOutOfRange { tile_id: id });
    }
    let (w, h) = (params.tile_width, params.tile_height);
    let sx = ((id / 128) % 2 * 8 + id % 8) as f32 * w;
    let sy = ((id % 256 / 8) % 16) as f32 * h;
    layer.push(TilePage::Set(set as u8), [sx, sy, w, h], [dx, dy, w, h]);
    Ok(())
}

fn add_autotile(
    layer: &mut TileLayer,
    id: u32,
    dx: f32,
    dy: f32,
    params: &DecodeParams<'_>,
) -> RenderResult<()> {
    let kind = autotile_kind(id);
    let shape = autotile_shape(id) as usize;
    let (tx, ty) = (kind % 8, kind / 8);
    let frame = params.animation_frame;

    let mut table: &[QuadrantTable] = &FLOOR_AUTOTILE_TABLE;
    let mut is_table = false;
    let (set, bx, by): (u8, u32, u32);

    if is_tile_a1(id) {
        let water = [0, 1, 2, 1][(frame % 4) as usize];
        set = 0;
        (bx, by) = match kind {
            0 => (water * 2, 0),
            1 => (water * 2, 3),
            2 => (6, 0),
            3 => (6, 3),
            _ => {
                let bx = tx / 4 * 8;
                let by = ty * 6 + tx / 2 % 2 * 3;
                if kind % 2 == 0 {
                    (bx + water * 2, by)
                } else {
                    table = &WATERFALL_AUTOTILE_TABLE;
                    (bx + 6, by + (frame % 3) as u32)
                }
            }
        };
    } else if is_tile_a2(id) {
        set = 1;
        (bx, by) = (tx * 2, (ty - 2) * 3);
        is_table = params.is_table_tile(id);
    } else if is_tile_a3(id) {
        set = 2;
        (bx, by) = (tx * 2, (ty - 6) * 2);
        table = &WALL_AUTOTILE_TABLE;
    } else {
        set = 3;
        // Rows alternate between 3- and 2-tile-high blocks.
        (bx, by) = (tx * 2, ((ty - 10) * 5 + ty % 2) / 2);
        if ty % 2 == 1 {
            table = &WALL_AUTOTILE_TABLE;
        }
    }

    let Some(entry) = table.get(shape) else {
        return Err(RenderError::DecodeOutOfRange { tile_id: id });
    };
    let (w1, h1) = (params.tile_width / 2.0, params.tile_height / 2.0);
    let page = TilePage::Set(set);

    for (i, &[qsx, qsy]) in entry.iter().enumerate() {
        let sx1 = (bx * 2 + qsx as u32) as f32 * w1;
        let sy1 = (by * 2 + qsy as u32) as f32 * h1;
        let dx1 = dx + (i % 2) as f32 * w1;
        let dy1 = dy + (i / 2) as f32 * h1;
        if is_table && (qsy == 1 || qsy == 5) {
            // Table top quadrant over the half-height front face.
            let qsx2 = if qsy == 1 { (4 - qsx) % 4 } else { qsx };
            let sx2 = (bx * 2 + qsx2 as u32) as f32 * w1;
            let sy2 = (by * 2 + 3) as f32 * h1;
            layer.push(page, [sx2, sy2, w1, h1], [dx1, dy1, w1, h1]);
            layer.push(page, [sx1, sy1, w1, h1 / 2.0], [dx1, dy1 + h1 / 2.0, w1, h1 / 2.0]);
        } else {
            layer.push(page, [sx1, sy1, w1, h1], [dx1, dy1, w1, h1]);
        }
    }
    Ok(())
}

/// Front edge of the table tile `upper_id` continued into the cell below.
pub(crate) fn add_table_edge(
    layer: &mut TileLayer,
    upper_id: u32,
    dx: f32,
    dy: f32,
    params: &DecodeParams<'_>,
) -> RenderResult<()> {
    if !is_tile_a2(upper_id) {
        return Ok(());
    }
    let kind = autotile_kind(upper_id);
    let Some(entry) = FLOOR_AUTOTILE_TABLE.get(autotile_shape(upper_id) as usize) else {
        return Err(RenderError::DecodeOutOfRange { tile_id: upper_id });
    };
    let (bx, by) = (kind % 8 * 2, (kind / 8 - 2) * 3);
    let (w1, h1) = (params.tile_width / 2.0, params.tile_height / 2.0);
    for i in 0..2 {
        let [qsx, qsy] = entry[2 + i];
        let sx1 = (bx * 2 + qsx as u32) as f32 * w1;
        let sy1 = (by * 2 + qsy as u32) as f32 * h1 + h1 / 2.0;
        let dx1 = dx + i as f32 * w1;
        layer.push(TilePage::Set(1), [sx1, sy1, w1, h1 / 2.0], [dx1, dy, w1, h1 / 2.0]);
    }
    Ok(())
}

/// Flat quadrants for each set bit of `bits` (top-left, top-right,
/// bottom-left, bottom-right).
pub(crate) fn add_shadow(layer: &mut TileLayer, bits: u32, dx: f32, dy: f32, params: &DecodeParams<'_>) {
    if bits & 0x0f == 0 {
        return;
    }
    let (w1, h1) = (params.tile_width / 2.0, params.tile_height / 2.0);
    for i in 0..4 {
        if bits & (1 << i) != 0 {
            let dx1 = dx + (i % 2) as f32 * w1;
            let dy1 = dy + (i / 2) as f32 * h1;
            layer.push(TilePage::Shadow, [0.0; 4], [dx1, dy1, w1, h1]);
        }
    }
}
