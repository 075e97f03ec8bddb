//! Cache-aside coordination for user reads and writes

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::DomainError;
use crate::domain::cache::{
    Cache, CacheExt, InvalidationIncomplete, InvalidationRegistry, InvalidationScope,
    UserCacheKeys,
};
use crate::domain::user::{
    NewUser, RangeDimension, User, UserChanges, UserId, UserRepository,
};
use crate::infrastructure::observability::{
    LookupOutcome, LookupShape, record_cache_lookup, record_invalidation, record_store_latency,
};

/// TTLs, timeouts and key namespaces used by [`UserCacheService`]
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL for single-user entries
    pub point_ttl: Duration,
    /// TTL for range query results
    pub range_ttl: Duration,
    /// Upper bound for any single call to either store
    pub store_timeout: Duration,
    pub point_namespace: String,
    pub range_namespace: String,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            point_ttl: Duration::from_secs(300),
            range_ttl: Duration::from_secs(120),
            store_timeout: Duration::from_secs(5),
            point_namespace: "user".to_string(),
            range_namespace: "users".to_string(),
        }
    }
}

impl CachePolicy {
    pub fn with_point_ttl(mut self, ttl: Duration) -> Self {
        self.point_ttl = ttl;
        self
    }

    pub fn with_range_ttl(mut self, ttl: Duration) -> Self {
        self.range_ttl = ttl;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_namespaces(
        mut self,
        point_namespace: impl Into<String>,
        range_namespace: impl Into<String>,
    ) -> Self {
        self.point_namespace = point_namespace.into();
        self.range_namespace = range_namespace.into();
        self
    }
}

/// Outcome of a committed write
///
/// The write always succeeded. `warning` is set when some cache entries could
/// not be dropped afterwards and may serve stale data until they expire.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult<T> {
    pub value: T,
    pub warning: Option<InvalidationIncomplete>,
}

impl<T> WriteResult<T> {
    pub fn new(value: T, warning: Option<InvalidationIncomplete>) -> Self {
        Self { value, warning }
    }

    /// True when every affected cache entry was dropped
    pub fn is_complete(&self) -> bool {
        self.warning.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Cache-aside coordinator in front of the user record store
#[derive(Debug)]
pub struct UserCacheService {
    repository: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
    policy: CachePolicy,
    keys: UserCacheKeys,
    registry: InvalidationRegistry,
}

impl UserCacheService {
    /// Creates a coordinator with the default policy
    pub fn new(repository: Arc<dyn UserRepository>, cache: Arc<dyn Cache>) -> Self {
        let keys = UserCacheKeys::default();
        let registry = InvalidationRegistry::new(&keys);

        Self {
            repository,
            cache,
            policy: CachePolicy::default(),
            keys,
            registry,
        }
    }

    /// Creates a coordinator with a custom policy. Fails if the namespaces are unusable.
    pub fn with_policy(
        repository: Arc<dyn UserRepository>,
        cache: Arc<dyn Cache>,
        policy: CachePolicy,
    ) -> Result<Self, DomainError> {
        let keys = UserCacheKeys::new(&policy.point_namespace, &policy.range_namespace)?;
        let registry = InvalidationRegistry::new(&keys);

        Ok(Self {
            repository,
            cache,
            policy,
            keys,
            registry,
        })
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn keys(&self) -> &UserCacheKeys {
        &self.keys
    }

    /// Looks up one user by id. A missing user is not cached.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let key = self.keys.point_key(id);

        if let Some(user) = self.lookup::<User>(&key, LookupShape::Point).await {
            return Ok(Some(user));
        }

        let user = self
            .store_call("get", self.repository.get(id))
            .await?;

        if let Some(user) = &user {
            self.populate(&key, user, self.policy.point_ttl).await;
        }

        Ok(user)
    }

    /// Users whose `dimension` lies in `[low, high]`, ordered by that dimension
    /// then id. Empty results, including those of an inverted range, are cached
    /// like any other.
    pub async fn get_users_by_range(
        &self,
        dimension: RangeDimension,
        low: i64,
        high: i64,
    ) -> Result<Vec<User>, DomainError> {
        let key = self.keys.range_key(dimension, low, high);

        if let Some(users) = self.lookup::<Vec<User>>(&key, LookupShape::Range).await {
            return Ok(users);
        }

        let users = self
            .store_call(
                "find_by_range",
                self.repository.find_by_range(dimension, low, high),
            )
            .await?;

        self.populate(&key, &users, self.policy.range_ttl).await;

        Ok(users)
    }

    /// Inserts a user, then drops every cached range result
    pub async fn create_user(&self, user: NewUser) -> Result<WriteResult<User>, DomainError> {
        user.validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let created = self
            .store_call("create", self.repository.create(user))
            .await?;

        info!(user_id = %created.id(), "User created");

        let warning = self.drop_scopes(self.registry.scopes_for_create()).await;

        Ok(WriteResult::new(created, warning))
    }

    /// Applies `changes` and returns the updated user, or `None` if there is no
    /// such user. The point entry is always dropped; range results only when a
    /// changed field is a range dimension.
    pub async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
    ) -> Result<Option<WriteResult<User>>, DomainError> {
        changes
            .validate()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let Some(updated) = self
            .store_call("update", self.repository.update(id, &changes))
            .await?
        else {
            debug!(user_id = %id, "Update matched no user");
            return Ok(None);
        };

        info!(user_id = %id, fields = ?changes.changed_fields(), "User updated");

        let point_warning = self.drop_key(&self.keys.point_key(id)).await;
        let scopes = self.registry.scopes_for_update(&changes);
        let scope_warning = self.drop_scopes(&scopes).await;

        Ok(Some(WriteResult::new(
            updated,
            merge_warnings(point_warning, scope_warning),
        )))
    }

    /// Drops every cache entry. Administrative only; reads and writes never call it.
    pub async fn clear_cache(&self) -> Result<(), DomainError> {
        self.cache_call("flush_all", self.cache.flush_all()).await?;
        info!("Cache flushed");
        Ok(())
    }

    async fn lookup<T>(&self, key: &str, shape: LookupShape) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let result: Result<Option<T>, DomainError> =
            self.cache_call("get", self.cache.get(key)).await;

        match result {
            Ok(Some(value)) => {
                debug!(key, "Cache hit");
                record_cache_lookup(shape, LookupOutcome::Hit);
                Some(value)
            }
            Ok(None) => {
                debug!(key, "Cache miss");
                record_cache_lookup(shape, LookupOutcome::Miss);
                None
            }
            Err(e @ DomainError::Serialization { .. }) => {
                debug!(key, error = %e, "Cached payload unreadable, treating as miss");
                record_cache_lookup(shape, LookupOutcome::Miss);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Cache lookup failed, reading from record store");
                record_cache_lookup(shape, LookupOutcome::Degraded);
                None
            }
        }
    }

    async fn populate<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + Send + Sync,
    {
        match self.cache_call("set", self.cache.set(key, value, ttl)).await {
            Ok(()) => debug!(key, ttl_secs = ttl.as_secs(), "Cache populated"),
            Err(e) => warn!(key, error = %e, "Failed to populate cache"),
        }
    }

    async fn drop_key(&self, key: &str) -> Option<InvalidationIncomplete> {
        match self.cache_call("delete", self.cache.delete(key)).await {
            Ok(existed) => {
                debug!(key, existed, "Cache entry invalidated");
                record_invalidation("point", true);
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to invalidate cache entry");
                record_invalidation("point", false);
                Some(InvalidationIncomplete::new(key, e.to_string()))
            }
        }
    }

    async fn drop_scopes(&self, scopes: &[InvalidationScope]) -> Option<InvalidationIncomplete> {
        let mut warning = None;

        for scope in scopes {
            let result = self
                .cache_call("delete_pattern", self.cache.delete_pattern(scope.pattern()))
                .await;

            match result {
                Ok(deleted) => {
                    debug!(scope = %scope, deleted, "Cache scope invalidated");
                    record_invalidation("scope", true);
                }
                Err(e) => {
                    warn!(scope = %scope, error = %e, "Failed to invalidate cache scope");
                    record_invalidation("scope", false);
                    warning = merge_warnings(
                        warning,
                        Some(InvalidationIncomplete::new(scope.pattern(), e.to_string())),
                    );
                }
            }
        }

        warning
    }

    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        let started = Instant::now();

        let result = match timeout(self.policy.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::storage(format!(
                "Record store {} timed out after {:?}",
                operation, self.policy.store_timeout
            ))),
        };

        record_store_latency(operation, started.elapsed(), result.is_ok());
        result
    }

    async fn cache_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match timeout(self.policy.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::cache(format!(
                "Cache {} timed out after {:?}",
                operation, self.policy.store_timeout
            ))),
        }
    }
}

fn merge_warnings(
    first: Option<InvalidationIncomplete>,
    second: Option<InvalidationIncomplete>,
) -> Option<InvalidationIncomplete> {
    match (first, second) {
        (Some(first), Some(second)) => Some(first.merge(second)),
        (first, second) => first.or(second),
    }
}
