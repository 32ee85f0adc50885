use crate::coords::Rect;
use crate::device::{Program, RawFramebuffer};
use crate::pool::{PoolRegistry, Poolable};
use crate::resource::{RenderTargetId, TargetStorage};

/// Post-process effect applied to a node's offscreen rendering.
///
/// A filter runs `passes()` draws; pass `i` samples the previous pass (or
/// the node's rendering for pass 0) through `program(i)`.
pub trait Filter: core::fmt::Debug + 'static {
    fn passes(&self) -> usize {
        1
    }

    fn program(&self, pass: usize) -> Program;

    /// Pixels added around the filtered area so effects can spill over.
    fn padding(&self) -> f32 {
        0.0
    }

    /// Hands the filter back to its pool.
    fn recycle(self: Box<Self>, pools: &mut PoolRegistry);
}

// ── color matrix ──────────────────────────────────────────────────────────

const IDENTITY_MATRIX: [f32; 20] = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0, //
];

/// 4x5 row-major color matrix over straight-alpha RGBA; the fifth column
/// is an offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMatrixFilter {
    pub matrix: [f32; 20],
}

impl Default for ColorMatrixFilter {
    fn default() -> Self {
        Self {
            matrix: IDENTITY_MATRIX,
        }
    }
}

impl Poolable for ColorMatrixFilter {
    fn reset(&mut self) {
        self.matrix = IDENTITY_MATRIX;
    }
}

impl ColorMatrixFilter {
    /// Takes a pooled filter.
    pub fn acquire(pools: &mut PoolRegistry) -> Box<Self> {
        pools.acquire::<Box<Self>>()
    }

    /// Luminance grayscale blended by `amount` (0 = unchanged).
    pub fn set_grayscale(&mut self, amount: f32) {
        let k = amount.clamp(0.0, 1.0);
        let (r, g, b) = (0.299, 0.587, 0.114);
        let mut m = IDENTITY_MATRIX;
        for row in 0..3 {
            let base = row * 5;
            let lum = [r, g, b];
            for col in 0..3 {
                let id = if row == col { 1.0 } else { 0.0 };
                m[base + col] = id * (1.0 - k) + lum[col] * k;
            }
        }
        self.matrix = m;
    }

    /// Adds `tone` (-1..1 per channel) to RGB.
    pub fn set_tone(&mut self, r: f32, g: f32, b: f32) {
        self.matrix[4] = r.clamp(-1.0, 1.0);
        self.matrix[9] = g.clamp(-1.0, 1.0);
        self.matrix[14] = b.clamp(-1.0, 1.0);
    }
}

impl Filter for ColorMatrixFilter {
    fn program(&self, _pass: usize) -> Program {
        Program::ColorMatrix(self.matrix)
    }

    fn recycle(self: Box<Self>, pools: &mut PoolRegistry) {
        pools.release::<Box<Self>>(self);
    }
}

// ── blur ──────────────────────────────────────────────────────────────────

/// Separable gaussian: a horizontal then a vertical pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurFilter {
    /// Pixels between taps.
    pub strength: f32,
}

impl Default for BlurFilter {
    fn default() -> Self {
        Self { strength: 1.0 }
    }
}

impl Poolable for BlurFilter {
    fn reset(&mut self) {
        self.strength = 1.0;
    }
}

impl BlurFilter {
    pub fn acquire(pools: &mut PoolRegistry) -> Box<Self> {
        pools.acquire::<Box<Self>>()
    }
}

impl Filter for BlurFilter {
    fn passes(&self) -> usize {
        2
    }

    fn program(&self, pass: usize) -> Program {
        let s = self.strength.max(0.0);
        let direction = if pass == 0 { [s, 0.0] } else { [0.0, s] };
        Program::Blur { direction }
    }

    /// Four taps either side.
    fn padding(&self) -> f32 {
        (self.strength.max(0.0) * 4.0).ceil()
    }

    fn recycle(self: Box<Self>, pools: &mut PoolRegistry) {
        pools.release::<Box<Self>>(self);
    }
}

// ── filter stack ──────────────────────────────────────────────────────────

/// One level of the filter stack: where the node renders and what to
/// return to afterwards.
#[derive(Debug, Default)]
pub struct FilterFrame {
    /// Offscreen target the filtered node renders into.
    pub target: Option<RenderTargetId>,
    pub storage: Option<TargetStorage>,
    /// Scene-space rectangle covered by the target.
    pub area: Rect,
    /// Target and area active before the push.
    pub previous: (Option<RawFramebuffer>, Rect),
    /// Stencil level of the previous target.
    pub previous_stencil: u32,
    /// Whether the previous target was clipping chrome windows.
    pub previous_window_clip: bool,
}

impl Poolable for FilterFrame {
    fn reset(&mut self) {
        *self = FilterFrame::default();
    }
}
