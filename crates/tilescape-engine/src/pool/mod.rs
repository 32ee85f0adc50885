//! Object pools.
//!
//! Every short-lived render object (filter frames, stencil frames, filters,
//! vertex batches) is recycled through a [`Pool`] instead of being dropped.
//! Pools are per type and live in a [`PoolRegistry`] owned by the render
//! context.
//!
//! Contract:
//! - `acquire` never fails; it falls back to `T::default()`
//! - `release` calls [`Poolable::reset`] before the value becomes free
//! - free values are handed out again in LIFO order

mod pool;
mod registry;

pub use pool::{Pool, PoolStats, Poolable};
pub use registry::PoolRegistry;
