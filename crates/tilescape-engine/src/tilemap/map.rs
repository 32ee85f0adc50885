/// Layers read per cell: four tile ids then the shadow bits.
pub const MAP_LAYERS: usize = 5;
pub const SHADOW_LAYER: usize = 4;

/// Read-only view of the world's tile grid.
///
/// Cells outside the map read as `0` (no tile).
pub trait MapData {
    fn read_cell(&self, x: i32, y: i32, layer: usize) -> u32;

    /// `true` where characters walk beneath layers 2 and 3.
    fn is_overpass(&self, _x: i32, _y: i32) -> bool {
        false
    }
}

/// Dense map stored layer-major, with optional wrap-around.
#[derive(Debug, Clone, Default)]
pub struct GridMap {
    width: i32,
    height: i32,
    data: Vec<u32>,
    pub horizontal_wrap: bool,
    pub vertical_wrap: bool,
}

impl GridMap {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.min(i32::MAX as u32) as i32;
        let height = height.min(i32::MAX as u32) as i32;
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * MAP_LAYERS],
            horizontal_wrap: false,
            vertical_wrap: false,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Writes one cell; out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, layer: usize, tile_id: u32) {
        if let Some(i) = self.index(x as i32, y as i32, layer) {
            self.data[i] = tile_id;
        }
    }

    /// Fills `layer` everywhere with `tile_id`.
    pub fn fill_layer(&mut self, layer: usize, tile_id: u32) {
        if layer >= MAP_LAYERS {
            return;
        }
        let n = self.layer_len();
        self.data[layer * n..(layer + 1) * n].fill(tile_id);
    }

    #[inline]
    fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn index(&self, x: i32, y: i32, layer: usize) -> Option<usize> {
        if layer >= MAP_LAYERS || x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((layer * self.height as usize + y as usize) * self.width as usize + x as usize)
    }
}

impl MapData for GridMap {
    fn read_cell(&self, x: i32, y: i32, layer: usize) -> u32 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let x = if self.horizontal_wrap { x.rem_euclid(self.width) } else { x };
        let y = if self.vertical_wrap { y.rem_euclid(self.height) } else { y };
        self.index(x, y, layer).map_or(0, |i| self.data[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_outside_the_map_are_empty() {
        let mut map = GridMap::new(3, 2);
        map.set(2, 1, 0, 7);
        assert_eq!(map.read_cell(2, 1, 0), 7);
        assert_eq!(map.read_cell(3, 1, 0), 0);
        assert_eq!(map.read_cell(-1, 0, 0), 0);
        assert_eq!(map.read_cell(0, 0, MAP_LAYERS), 0);
    }

    #[test]
    fn wrapping_folds_coordinates() {
        let mut map = GridMap::new(3, 2);
        map.set(0, 0, 1, 9);
        map.horizontal_wrap = true;
        assert_eq!(map.read_cell(3, 0, 1), 9);
        assert_eq!(map.read_cell(-3, 0, 1), 9);
        assert_eq!(map.read_cell(0, 2, 1), 0);
        map.vertical_wrap = true;
        assert_eq!(map.read_cell(3, -2, 1), 9);
    }

    #[test]
    fn layer_length_does_not_overflow_on_huge_maps() {
        let map = GridMap {
            width: 50_000,
            height: 50_000,
            data: Vec::new(),
            horizontal_wrap: false,
            vertical_wrap: false,
        };
        assert_eq!(map.layer_len(), 2_500_000_000);
    }

    #[test]
    fn layers_do_not_alias() {
        let mut map = GridMap::new(2, 2);
        map.fill_layer(SHADOW_LAYER, 0b0101);
        assert_eq!(map.read_cell(1, 1, SHADOW_LAYER), 0b0101);
        assert_eq!(map.read_cell(1, 1, 3), 0);
    }
}
