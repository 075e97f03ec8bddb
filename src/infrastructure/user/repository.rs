//! In-memory user repository implementation

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::DomainError;
use crate::domain::user::{NewUser, RangeDimension, User, UserChanges, UserId, UserRepository};

/// In-memory implementation of UserRepository
///
/// IDs come from a monotonic sequence and are never reused. Email uniqueness
/// is enforced on create and update, like the unique index in PostgreSQL.
#[derive(Debug)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<BTreeMap<i64, User>>>,
    sequence: AtomicI64,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(BTreeMap::new())),
            sequence: AtomicI64::new(0),
        }
    }

    /// Create a repository with initial users
    pub async fn with_users(users: Vec<NewUser>) -> Result<Self, DomainError> {
        let repo = Self::new();

        for user in users {
            repo.create(user).await?;
        }

        Ok(repo)
    }

    fn email_taken(users: &BTreeMap<i64, User>, email: &str, except: Option<i64>) -> bool {
        users
            .values()
            .any(|u| u.email() == email && Some(u.id().value()) != except)
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let users = self.users.read().await;
        Ok(users.get(&id.value()).cloned())
    }

    async fn find_by_range(
        &self,
        dimension: RangeDimension,
        low: i64,
        high: i64,
    ) -> Result<Vec<User>, DomainError> {
        let users = self.users.read().await;

        let mut matching: Vec<User> = users
            .values()
            .filter(|u| (low..=high).contains(&dimension.value_of(u)))
            .cloned()
            .collect();

        matching.sort_by_key(|u| (dimension.value_of(u), u.id()));
        Ok(matching)
    }

    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        let mut users = self.users.write().await;

        if Self::email_taken(&users, &user.email, None) {
            return Err(DomainError::conflict(format!(
                "Email '{}' already exists",
                user.email
            )));
        }

        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let user_id = UserId::new(id)
            .map_err(|e| DomainError::internal(format!("Invalid generated ID: {}", e)))?;

        let created = User::from_parts(user_id, user.name, user.email, user.age, Utc::now());
        users.insert(id, created.clone());

        Ok(created)
    }

    async fn update(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<User>, DomainError> {
        if changes.is_empty() {
            return Err(DomainError::validation("Update contains no changes"));
        }

        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if Self::email_taken(&users, email, Some(id.value())) {
                return Err(DomainError::conflict(format!(
                    "Email '{}' already exists",
                    email
                )));
            }
        }

        match users.get_mut(&id.value()) {
            Some(user) => {
                user.apply(changes);
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.users.read().await.len())
    }
}
