//! Domain layer - Entities, store contracts and cache-aside policy types

pub mod cache;
pub mod error;
pub mod user;

pub use cache::{
    Cache, CacheExt, CacheStats, InvalidationIncomplete, InvalidationRegistry, InvalidationScope,
    KeyPattern, UserCacheKeys,
};
pub use error::DomainError;
pub use user::{NewUser, RangeDimension, User, UserChanges, UserField, UserId, UserRepository};
