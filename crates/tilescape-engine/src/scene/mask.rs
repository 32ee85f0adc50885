use crate::pool::Poolable;

use super::NodeId;

/// One level of stencil clipping.
///
/// Pushing draws the mask shape with `Increment` where the stencil equals
/// `level - 1`; content then draws where it equals `level`. Popping draws
/// the same shape with `Decrement`.
#[derive(Debug, Default)]
pub struct StencilFrame {
    pub mask: NodeId,
    /// Stencil value inside the mask once pushed.
    pub level: u32,
}

impl Poolable for StencilFrame {
    fn reset(&mut self) {
        self.mask = NodeId::default();
        self.level = 0;
    }
}
