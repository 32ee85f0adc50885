use crate::device::GpuBackend;
use crate::error::RenderResult;

use super::{Binder, Diagnostics, RenderTargetId, RenderTargetPool, TargetStorage};

/// Smallest filter target edge.
const MIN_EDGE: u32 = 16;

/// Offscreen targets for filter passes, sized in power-of-two buckets so
/// areas that differ by a few pixels between frames share storage.
#[derive(Debug, Default)]
pub struct FilterTargetPool {
    inner: RenderTargetPool,
}

/// Power-of-two bucket covering a pixel extent.
pub fn bucket_size(width: f32, height: f32) -> (u32, u32) {
    let edge = |v: f32| (v.ceil().max(1.0) as u32).next_power_of_two().max(MIN_EDGE);
    (edge(width), edge(height))
}

impl FilterTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, width: f32, height: f32) -> RenderTargetId {
        let (w, h) = bucket_size(width, height);
        self.inner.acquire(w as f32, h as f32, 1.0)
    }

    pub fn release(&mut self, id: RenderTargetId) -> RenderResult<()> {
        self.inner.release(id)
    }

    pub fn ensure_storage<B: GpuBackend>(
        &mut self,
        id: RenderTargetId,
        binder: &mut Binder<B>,
        diag: &mut Diagnostics,
    ) -> Option<TargetStorage> {
        self.inner.ensure_storage(id, binder, diag)
    }

    pub fn targets(&self) -> &RenderTargetPool {
        &self.inner
    }

    pub(crate) fn forget_storage(&mut self) {
        self.inner.forget_storage();
    }

    pub fn drain<B: GpuBackend>(&mut self, binder: &mut Binder<B>) {
        self.inner.drain(binder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_round_up_to_powers_of_two() {
        assert_eq!(bucket_size(100.0, 3.0), (128, 16));
        assert_eq!(bucket_size(128.0, 129.5), (128, 256));
    }

    #[test]
    fn nearby_sizes_share_a_target() {
        let mut pool = FilterTargetPool::new();
        let a = pool.acquire(200.0, 90.0);
        pool.release(a).ok();
        let b = pool.acquire(210.0, 100.0);
        assert_eq!(a, b);
        assert_eq!(pool.targets().stats().created, 1);
        assert_eq!(pool.targets().get(b).map(|t| t.storage_size()), Some((256, 128)));
    }
}
