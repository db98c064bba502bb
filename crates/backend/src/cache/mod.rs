//! Caches in front of the tag store and the root resolver
//!
//! - [`CounterCache`]: `(tenant, user, folder) -> count`, kept coherent across
//!   processes through an [`InvalidationBus`]
//! - [`RootIdCache`]: well-known root ids per tenant and user

mod bus;
mod counter;
mod roots;

pub use bus::{BroadcastBus, CacheError, InvalidationBus};
pub use counter::{CacheStats, CounterCache, CounterKey};
pub use roots::RootIdCache;
