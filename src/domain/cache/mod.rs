//! Cache domain - cache store contract, key scheme and invalidation scopes

mod key;
mod repository;
mod scope;

pub use key::{KeyPattern, UserCacheKeys};
pub use repository::{Cache, CacheExt, CacheStats, KeyStream};
pub use scope::{InvalidationIncomplete, InvalidationRegistry, InvalidationScope};

#[cfg(test)]
pub use repository::mock::MockCache;
