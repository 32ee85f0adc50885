/// A value that can be recycled through a [`Pool`].
///
/// `Default` is the factory. `reset` must return every field to the value
/// `Default` would produce, except for retained allocations (vector capacity,
/// device storage) which are kept on purpose.
pub trait Poolable: Default + 'static {
    fn reset(&mut self);
}

/// Boxed values keep their allocation across reuse; used for filters that
/// live behind `Box<dyn Filter>`.
impl<T: Poolable> Poolable for Box<T> {
    fn reset(&mut self) {
        T::reset(self);
    }
}

/// Counters describing how a pool has been used.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// Values constructed because the free list was empty.
    pub created: u64,
    /// Values handed out from the free list.
    pub reused: u64,
    /// Values currently owned by callers.
    pub outstanding: u64,
    /// Values dropped on release because the pool was full.
    pub overflowed: u64,
}

/// LIFO free list for one type.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    free: Vec<T>,
    limit: Option<usize>,
    stats: PoolStats,
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Pool<T> {
    /// Unbounded pool.
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            limit: None,
            stats: PoolStats::default(),
        }
    }

    /// Pool that keeps at most `limit` free values; extra releases are dropped.
    pub fn bounded(limit: usize) -> Self {
        Self {
            free: Vec::with_capacity(limit),
            limit: Some(limit),
            stats: PoolStats::default(),
        }
    }

    /// Takes the most recently released value, or constructs a fresh one.
    pub fn acquire(&mut self) -> T {
        self.stats.outstanding += 1;
        match self.free.pop() {
            Some(value) => {
                self.stats.reused += 1;
                value
            }
            None => {
                self.stats.created += 1;
                T::default()
            }
        }
    }

    /// Acquires and initializes in one step.
    pub fn acquire_with(&mut self, init: impl FnOnce(&mut T)) -> T {
        let mut value = self.acquire();
        init(&mut value);
        value
    }

    /// Resets `value` and makes it available again.
    ///
    /// # Panics
    /// In debug builds, panics if more values are released than were
    /// acquired (the value was never handed out by this pool). Release builds
    /// do not check.
    pub fn release(&mut self, mut value: T) {
        debug_assert!(
            self.stats.outstanding > 0,
            "Pool<{}>::release: value was not acquired from this pool",
            std::any::type_name::<T>()
        );
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);

        value.reset();

        if self.limit.is_some_and(|limit| self.free.len() >= limit) {
            self.stats.overflowed += 1;
            return;
        }
        self.free.push(value);
    }

    /// Drops every free value. Outstanding values are unaffected.
    pub fn drain(&mut self) {
        self.free.clear();
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
