//! PMP Cache-Aside
//!
//! A cache-aside access layer for user records:
//! - Point and range reads served from a TTL cache, filled from the record store on a miss
//! - Writes go to the record store first, then drop the affected cache entries
//! - PostgreSQL or in-memory record stores, Redis or in-memory cache stores

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;

use crate::config::{CacheBackend, CacheSettings, DatabaseBackend, DatabaseConfig, PolicyConfig};
use crate::domain::{Cache, UserRepository};
use crate::infrastructure::{
    cache::{CacheConfig, CacheFactory},
    services::{CachePolicy, CacheStatsService, UserCacheService},
    user::{InMemoryUserRepository, PostgresConfig, PostgresUserRepository, sample_users},
};
use tracing::info;

/// The coordinator and the stats reporter, sharing one cache store
#[derive(Debug)]
pub struct AppServices {
    pub users: UserCacheService,
    pub stats: CacheStatsService,
}

/// Create the services with default configuration (in-memory stores)
pub async fn create_app_services() -> anyhow::Result<AppServices> {
    create_app_services_with_config(&AppConfig::default()).await
}

/// Create the services with custom configuration
pub async fn create_app_services_with_config(config: &AppConfig) -> anyhow::Result<AppServices> {
    let repository = create_user_repository(&config.database).await?;
    let cache = create_cache(&config.cache).await?;

    let users =
        UserCacheService::with_policy(repository, cache.clone(), cache_policy(&config.policy))?;
    let stats = CacheStatsService::new(cache);

    Ok(AppServices { users, stats })
}

/// Create the cache-aside coordinator with default configuration
pub async fn create_user_cache_service() -> anyhow::Result<UserCacheService> {
    Ok(create_app_services().await?.users)
}

/// Create the cache-aside coordinator with custom configuration
pub async fn create_user_cache_service_with_config(
    config: &AppConfig,
) -> anyhow::Result<UserCacheService> {
    Ok(create_app_services_with_config(config).await?.users)
}

/// Open the configured record store, creating and seeding it when asked to
pub async fn create_user_repository(
    config: &DatabaseConfig,
) -> anyhow::Result<Arc<dyn UserRepository>> {
    match config.backend {
        DatabaseBackend::InMemory => {
            let repository = if config.seed_sample_data {
                InMemoryUserRepository::with_users(sample_users()).await?
            } else {
                InMemoryUserRepository::new()
            };

            info!("Using in-memory record store");
            Ok(Arc::new(repository))
        }
        DatabaseBackend::Postgres => {
            let pg_config =
                PostgresConfig::new(&config.url).with_max_connections(config.max_connections);
            let repository = PostgresUserRepository::connect(&pg_config).await?;

            repository.ensure_schema().await?;

            if config.seed_sample_data {
                repository.seed_sample_users().await?;
            }

            info!("Using PostgreSQL record store");
            Ok(Arc::new(repository))
        }
    }
}

/// Open the configured cache store
pub async fn create_cache(settings: &CacheSettings) -> anyhow::Result<Arc<dyn Cache>> {
    let mut cache_config = match settings.backend {
        CacheBackend::InMemory => CacheConfig::in_memory().with_max_capacity(settings.max_capacity),
        CacheBackend::Redis => CacheConfig::redis(&settings.redis_url),
    };

    if let Some(prefix) = &settings.key_prefix {
        cache_config = cache_config.with_key_prefix(prefix.clone());
    }

    let cache = CacheFactory::new().create(&cache_config).await?;
    info!(backend = %cache_config.cache_type, "Cache store ready");

    Ok(cache)
}

fn cache_policy(config: &PolicyConfig) -> CachePolicy {
    CachePolicy::default()
        .with_point_ttl(config.point_ttl())
        .with_range_ttl(config.range_ttl())
        .with_store_timeout(config.store_timeout())
        .with_namespaces(&config.point_namespace, &config.range_namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewUser, RangeDimension, UserId};

    #[tokio::test]
    async fn test_default_services_are_seeded() {
        let services = create_app_services().await.unwrap();

        let alice = services
            .users
            .get_user(UserId::new(1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.name(), "Alice Johnson");

        let in_twenties = services
            .users
            .get_users_by_range(RangeDimension::Age, 20, 29)
            .await
            .unwrap();
        assert_eq!(in_twenties.len(), 3);
    }

    #[tokio::test]
    async fn test_stats_share_the_coordinator_cache() {
        let services = create_app_services().await.unwrap();
        let id = UserId::new(2).unwrap();

        services.users.get_user(id).await.unwrap();
        services.users.get_user(id).await.unwrap();

        let report = services.stats.get_stats().await.unwrap();
        assert_eq!(report.keyspace_hits, 1);
        assert_eq!(report.keyspace_misses, 1);
        assert_eq!(report.hit_rate, 50.0);
    }

    #[tokio::test]
    async fn test_unseeded_in_memory_store() {
        let mut config = AppConfig::default();
        config.database.seed_sample_data = false;

        let service = create_user_cache_service_with_config(&config).await.unwrap();
        let created = service
            .create_user(NewUser::new("Alice", "alice@x.com", 28))
            .await
            .unwrap();

        assert_eq!(created.value.id().value(), 1);
    }

    #[test]
    fn test_cache_policy_from_config() {
        let config = PolicyConfig {
            point_ttl_secs: 10,
            range_ttl_secs: 5,
            store_timeout_ms: 250,
            point_namespace: "p".to_string(),
            range_namespace: "r".to_string(),
        };

        let policy = cache_policy(&config);

        assert_eq!(policy.point_ttl, std::time::Duration::from_secs(10));
        assert_eq!(policy.range_ttl, std::time::Duration::from_secs(5));
        assert_eq!(policy.store_timeout, std::time::Duration::from_millis(250));
        assert_eq!(policy.point_namespace, "p");
    }
}
