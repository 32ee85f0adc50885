use slotmap::{new_key_type, SlotMap};

use crate::device::{GpuBackend, RawFramebuffer, RawTexture};
use crate::error::{RenderError, RenderResult};

use super::{Binder, Diagnostics};

new_key_type! {
    /// Handle to a pooled render target.
    pub struct RenderTargetId;
}

/// Device framebuffer backing a target.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TargetStorage {
    pub framebuffer: RawFramebuffer,
    pub texture: RawTexture,
    pub width: u32,
    pub height: u32,
    pub(crate) generation: u64,
}

/// Offscreen render target.
///
/// Logical size times resolution gives the physical size; storage is at
/// least that and never shrinks.
#[derive(Debug)]
pub struct RenderTarget {
    width: f32,
    height: f32,
    resolution: f32,
    storage: (u32, u32),
    size_version: u64,
    leased: bool,
    pub(crate) gpu: Option<TargetStorage>,
}

impl RenderTarget {
    fn new() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            resolution: 1.0,
            storage: (0, 0),
            size_version: 0,
            leased: false,
            gpu: None,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Bumped on every logical resize.
    #[inline]
    pub fn size_version(&self) -> u64 {
        self.size_version
    }

    /// Physical storage size in texels.
    #[inline]
    pub fn storage_size(&self) -> (u32, u32) {
        self.storage
    }

    #[inline]
    pub fn is_leased(&self) -> bool {
        self.leased
    }

    pub fn physical_size(&self) -> (u32, u32) {
        physical(self.width, self.height, self.resolution)
    }

    fn fits(&self, physical: (u32, u32)) -> bool {
        self.storage.0 >= physical.0 && self.storage.1 >= physical.1
    }

    fn resize(&mut self, width: f32, height: f32, resolution: f32) {
        if (self.width, self.height, self.resolution) != (width, height, resolution) {
            self.width = width;
            self.height = height;
            self.resolution = resolution;
            self.size_version += 1;
        }
        let (pw, ph) = self.physical_size();
        self.storage = (self.storage.0.max(pw), self.storage.1.max(ph));
    }
}

fn physical(width: f32, height: f32, resolution: f32) -> (u32, u32) {
    let px = |v: f32| ((v * resolution).ceil().max(1.0)) as u32;
    (px(width), px(height))
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TargetPoolStats {
    pub created: u64,
    /// Free targets whose storage already fit.
    pub reused: u64,
    /// Free targets that had to grow.
    pub grown: u64,
}

/// Pool of offscreen targets, reused LIFO.
#[derive(Debug, Default)]
pub struct RenderTargetPool {
    targets: SlotMap<RenderTargetId, RenderTarget>,
    free: Vec<RenderTargetId>,
    stats: TargetPoolStats,
}

impl RenderTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leases a target of the given logical size.
    ///
    /// Picks the most recently released target whose storage fits; else the
    /// most recently released target, grown; else a new one.
    pub fn acquire(&mut self, width: f32, height: f32, resolution: f32) -> RenderTargetId {
        let resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution
        } else {
            1.0
        };
        let need = physical(width.max(0.0), height.max(0.0), resolution);

        let fitting = self
            .free
            .iter()
            .rposition(|id| self.targets.get(*id).is_some_and(|t| t.fits(need)));
        let id = match fitting {
            Some(i) => {
                self.stats.reused += 1;
                Some(self.free.remove(i))
            }
            None => self.free.pop().inspect(|_| self.stats.grown += 1),
        };
        let id = id.unwrap_or_else(|| {
            self.stats.created += 1;
            self.targets.insert(RenderTarget::new())
        });

        if let Some(t) = self.targets.get_mut(id) {
            t.resize(width.max(0.0), height.max(0.0), resolution);
            t.leased = true;
        }
        id
    }

    /// Returns a leased target to the pool.
    pub fn release(&mut self, id: RenderTargetId) -> RenderResult<()> {
        match self.targets.get_mut(id) {
            Some(t) if t.leased => {
                t.leased = false;
                self.free.push(id);
                Ok(())
            }
            Some(_) => Err(RenderError::PoolContractViolation {
                type_name: "RenderTarget",
                detail: "released twice",
            }),
            None => Err(RenderError::PoolContractViolation {
                type_name: "RenderTarget",
                detail: "not created by this pool",
            }),
        }
    }

    pub fn get(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.targets.get(id)
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn stats(&self) -> TargetPoolStats {
        self.stats
    }

    /// Device storage for `id`, (re)created when missing, stale or too
    /// small.
    pub fn ensure_storage<B: GpuBackend>(
        &mut self,
        id: RenderTargetId,
        binder: &mut Binder<B>,
        diag: &mut Diagnostics,
    ) -> Option<TargetStorage> {
        let generation = binder.generation();
        let target = self.targets.get_mut(id)?;
        let (sw, sh) = target.storage;

        if let Some(gpu) = target.gpu {
            if gpu.generation == generation && gpu.width >= sw && gpu.height >= sh {
                return Some(gpu);
            }
            if gpu.generation == generation {
                binder.destroy_framebuffer(gpu.framebuffer, gpu.texture);
            }
            target.gpu = None;
        }

        let (framebuffer, texture) = binder.create_framebuffer(sw, sh, diag)?;
        let gpu = TargetStorage {
            framebuffer,
            texture,
            width: sw,
            height: sh,
            generation,
        };
        target.gpu = Some(gpu);
        Some(gpu)
    }

    pub(crate) fn forget_storage(&mut self) {
        for t in self.targets.values_mut() {
            t.gpu = None;
        }
    }

    /// Destroys every free target.
    pub fn drain<B: GpuBackend>(&mut self, binder: &mut Binder<B>) {
        let generation = binder.generation();
        for id in self.free.drain(..) {
            if let Some(t) = self.targets.remove(id) {
                if let Some(gpu) = t.gpu.filter(|g| g.generation == generation) {
                    binder.destroy_framebuffer(gpu.framebuffer, gpu.texture);
                }
            }
        }
    }
}
