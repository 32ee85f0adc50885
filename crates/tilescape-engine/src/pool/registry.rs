use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::{Pool, PoolStats, Poolable};

/// Type-indexed collection of pools, created lazily on first use.
#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<TypeId, Box<dyn ErasedPool>>,
}

/// Object-safe view of a `Pool<T>` so the registry can drain pools without
/// knowing their element types.
trait ErasedPool: Any {
    fn drain(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Poolable> ErasedPool for Pool<T> {
    fn drain(&mut self) {
        Pool::drain(self);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pool for `T`, creating an unbounded one on first use.
    pub fn pool_mut<T: Poolable>(&mut self) -> &mut Pool<T> {
        self.pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Pool::<T>::new()))
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .unwrap_or_else(|| unreachable!("pool registry entry has the wrong type"))
    }

    /// Installs a specific pool for `T` (e.g. a bounded one), replacing any
    /// existing pool and its free values.
    pub fn install<T: Poolable>(&mut self, pool: Pool<T>) {
        self.pools.insert(TypeId::of::<T>(), Box::new(pool));
    }

    #[inline]
    pub fn acquire<T: Poolable>(&mut self) -> T {
        self.pool_mut::<T>().acquire()
    }

    #[inline]
    pub fn release<T: Poolable>(&mut self, value: T) {
        self.pool_mut::<T>().release(value);
    }

    /// Statistics for `T`, or `None` if no pool was ever created for it.
    pub fn stats<T: Poolable>(&self) -> Option<PoolStats> {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|p| p.as_any().downcast_ref::<Pool<T>>())
            .map(Pool::stats)
    }

    /// Drops every free value in every pool.
    pub fn drain_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.drain();
        }
        log::debug!("drained {} object pools", self.pools.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Alpha(u32);
    impl Poolable for Alpha {
        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    #[derive(Default)]
    struct Beta(Vec<u32>);
    impl Poolable for Beta {
        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn pools_are_created_lazily_per_type() {
        let mut registry = PoolRegistry::new();
        assert!(registry.stats::<Alpha>().is_none());

        let a = registry.acquire::<Alpha>();
        registry.release(a);

        assert_eq!(registry.stats::<Alpha>().map(|s| s.created), Some(1));
        assert!(registry.stats::<Beta>().is_none());
    }

    #[test]
    fn types_do_not_share_free_lists() {
        let mut registry = PoolRegistry::new();
        let a = registry.acquire::<Alpha>();
        registry.release(a);

        let _b = registry.acquire::<Beta>();
        assert_eq!(registry.pool_mut::<Alpha>().free_len(), 1);
        assert_eq!(registry.stats::<Beta>().map(|s| s.created), Some(1));
    }

    #[test]
    fn lifo_order_holds_through_the_registry() {
        let mut registry = PoolRegistry::new();
        let mut a = registry.acquire::<Beta>();
        let mut b = registry.acquire::<Beta>();
        a.0.reserve(10);
        b.0.reserve(300);
        let (cap_a, cap_b) = (a.0.capacity(), b.0.capacity());

        registry.release(a);
        registry.release(b);

        assert_eq!(registry.acquire::<Beta>().0.capacity(), cap_b);
        assert_eq!(registry.acquire::<Beta>().0.capacity(), cap_a);
    }

    #[test]
    fn drain_all_empties_every_pool() {
        let mut registry = PoolRegistry::new();
        let a = registry.acquire::<Alpha>();
        let b = registry.acquire::<Beta>();
        registry.release(a);
        registry.release(b);

        registry.drain_all();

        assert_eq!(registry.pool_mut::<Alpha>().free_len(), 0);
        assert_eq!(registry.pool_mut::<Beta>().free_len(), 0);
    }
}
