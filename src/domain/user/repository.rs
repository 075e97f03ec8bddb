//! User repository trait - the record store contract

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{NewUser, RangeDimension, User, UserChanges, UserId};
use crate::domain::DomainError;

/// Durable record store for users.
///
/// Every statement is auto-committed on its own; implementations must not leave
/// partial writes behind when they return an error.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by ID
    async fn get(&self, id: UserId) -> Result<Option<User>, DomainError>;

    /// Users whose `dimension` value lies in `[low, high]`, ascending by that
    /// value and then by ID
    async fn find_by_range(
        &self,
        dimension: RangeDimension,
        low: i64,
        high: i64,
    ) -> Result<Vec<User>, DomainError>;

    /// Insert a user, returning it with its generated ID and creation timestamp
    async fn create(&self, user: NewUser) -> Result<User, DomainError>;

    /// Apply the changes atomically and return the updated row, or `None` if
    /// no user has this ID
    async fn update(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<User>, DomainError>;

    /// Count all users
    async fn count(&self) -> Result<usize, DomainError>;
}
