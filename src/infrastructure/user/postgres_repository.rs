//! PostgreSQL user repository implementation

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;

use super::sample_users;
use crate::domain::DomainError;
use crate::domain::user::{
    NewUser, RangeDimension, User, UserChanges, UserField, UserId, UserRepository,
};

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pmp_cache_aside".to_string(),
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// PostgreSQL implementation of UserRepository
///
/// Every statement runs in auto-commit mode; writes use `RETURNING` so the
/// row is read back in the same statement that changed it.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and wrap it
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Create the users table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(100) UNIQUE NOT NULL,
                age INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create users table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS users_age_idx ON users (age)")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create age index: {}", e)))?;

        Ok(())
    }

    /// Insert the sample users when the table is empty. Returns how many were inserted.
    pub async fn seed_sample_users(&self) -> Result<usize, DomainError> {
        if self.count().await? > 0 {
            return Ok(0);
        }

        let samples = sample_users();
        let inserted = samples.len();

        for user in samples {
            self.create(user).await?;
        }

        info!(inserted, "Sample data inserted into PostgreSQL");
        Ok(inserted)
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, age, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_range(
        &self,
        dimension: RangeDimension,
        low: i64,
        high: i64,
    ) -> Result<Vec<User>, DomainError> {
        // Column names come from the closed RangeDimension enum, never from input
        let column = dimension.field().column();
        let sql = format!(
            r#"
            SELECT id, name, email, age, created_at
            FROM users
            WHERE {column} BETWEEN $1 AND $2
            ORDER BY {column}, id
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(low)
            .bind(high)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to query users by {}: {}", dimension, e))
            })?;

        rows.iter().map(row_to_user).collect()
    }

    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, age)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, age, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.age)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &user.email, "create"))?;

        row_to_user(&row)
    }

    async fn update(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<Option<User>, DomainError> {
        if changes.is_empty() {
            return Err(DomainError::validation("Update contains no changes"));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");

        {
            let mut assignments = builder.separated(", ");

            for field in changes.changed_fields() {
                assignments.push(format!("{} = ", field.column()));

                match field {
                    UserField::Name => assignments.push_bind_unseparated(changes.name.clone()),
                    UserField::Email => assignments.push_bind_unseparated(changes.email.clone()),
                    UserField::Age => assignments.push_bind_unseparated(changes.age),
                };
            }
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id.value())
            .push(" RETURNING id, name, email, age, created_at");

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                let email = changes.email.as_deref().unwrap_or_default();
                map_write_error(e, email, "update")
            })?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        Ok(count as usize)
    }
}

fn map_write_error(error: sqlx::Error, email: &str, action: &str) -> DomainError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return DomainError::conflict(format!("Email '{}' already exists", email));
        }
    }

    DomainError::storage(format!("Failed to {} user: {}", action, error))
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let column_error =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read user row: {}", e));

    let id: i64 = row.try_get("id").map_err(column_error)?;
    let name: String = row.try_get("name").map_err(column_error)?;
    let email: String = row.try_get("email").map_err(column_error)?;
    let age: i32 = row.try_get("age").map_err(column_error)?;
    let created_at: chrono::DateTime<chrono::Utc> =
        row.try_get("created_at").map_err(column_error)?;

    let user_id = UserId::new(id)
        .map_err(|e| DomainError::storage(format!("Invalid user ID in database: {}", e)))?;

    Ok(User::from_parts(user_id, name, email, age, created_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: tests marked #[ignore] need DATABASE_URL pointing at a scratch database

    async fn test_repository() -> PostgresUserRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let repo = PostgresUserRepository::connect(&PostgresConfig::new(url))
            .await
            .unwrap();
        repo.ensure_schema().await.unwrap();
        repo
    }

    fn unique_email(tag: &str) -> String {
        format!(
            "{}-{}@example.com",
            tag,
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        )
    }

    #[test]
    fn test_non_database_errors_map_to_storage() {
        let error = map_write_error(sqlx::Error::RowNotFound, "a@b.c", "create");
        assert!(matches!(error, DomainError::Storage { .. }));
    }

    #[test]
    fn test_default_config() {
        let config = PostgresConfig::default()
            .with_max_connections(4)
            .with_connect_timeout(3);

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.connect_timeout_secs, 3);
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_create_then_get() {
        let repo = test_repository().await;
        let email = unique_email("alice");

        let created = repo
            .create(NewUser::new("Alice", email.clone(), 28))
            .await
            .unwrap();
        let fetched = repo.get(created.id()).await.unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.email(), email);
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_duplicate_email_is_conflict() {
        let repo = test_repository().await;
        let email = unique_email("dup");

        repo.create(NewUser::new("A", email.clone(), 1)).await.unwrap();
        let result = repo.create(NewUser::new("B", email, 2)).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_update_only_touches_changed_columns() {
        let repo = test_repository().await;
        let created = repo
            .create(NewUser::new("Bob", unique_email("bob"), 34))
            .await
            .unwrap();

        let updated = repo
            .update(created.id(), &UserChanges::new().with_age(35))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.age(), 35);
        assert_eq!(updated.name(), "Bob");
        assert_eq!(updated.created_at(), created.created_at());
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_range_is_ordered() {
        let repo = test_repository().await;

        let users = repo
            .find_by_range(RangeDimension::Age, 0, 200)
            .await
            .unwrap();

        assert!(users.windows(2).all(|w| w[0].age() <= w[1].age()));
    }
}
