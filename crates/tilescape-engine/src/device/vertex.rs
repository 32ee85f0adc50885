use bytemuck::{Pod, Zeroable};

/// Interleaved vertex shared by the batcher and the tilemap.
///
/// `tex_coord` and `frame` are in texels of the bound texture; the shader
/// normalizes them with the texture's dimensions, so storage larger than
/// the content needs no special handling. `frame` is the source rectangle
/// inset by half a texel (`min.xy`, `max.zw`) and sampling is clamped to it.
/// `page < 0` draws the flat color without sampling.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
    pub frame: [f32; 4],
    pub color: [f32; 4],
    pub page: f32,
}

/// `page` value of untextured vertices.
pub const FLAT_PAGE: f32 = -1.0;

/// Index pattern of one quad whose corners are pushed as
/// top-left, top-right, bottom-left, bottom-right.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 3, 2];

impl Vertex {
    /// Four corners of a quad mapping `src` (texels) onto `dst` (pixels).
    pub fn quad(
        dst: [f32; 4],
        src: [f32; 4],
        color: [f32; 4],
        page: f32,
    ) -> [Vertex; 4] {
        let [dx, dy, dw, dh] = dst;
        let [sx, sy, sw, sh] = src;
        let frame = [sx + 0.5, sy + 0.5, sx + sw - 0.5, sy + sh - 0.5];
        let v = |px: f32, py: f32, tx: f32, ty: f32| Vertex {
            position: [px, py],
            tex_coord: [tx, ty],
            frame,
            color,
            page,
        };
        [
            v(dx, dy, sx, sy),
            v(dx + dw, dy, sx + sw, sy),
            v(dx, dy + dh, sx, sy + sh),
            v(dx + dw, dy + dh, sx + sw, sy + sh),
        ]
    }

    /// Quad with arbitrary corner positions (already transformed).
    pub fn quad_corners(
        corners: [[f32; 2]; 4],
        src: [f32; 4],
        color: [f32; 4],
        page: f32,
    ) -> [Vertex; 4] {
        let mut q = Self::quad([0.0; 4], src, color, page);
        for (v, c) in q.iter_mut().zip(corners) {
            v.position = c;
        }
        q
    }
}
