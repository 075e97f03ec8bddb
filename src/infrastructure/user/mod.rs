//! User infrastructure module
//!
//! Record store adapters: PostgreSQL for real deployments and an in-memory
//! repository with the same semantics for tests and local runs.

mod postgres_repository;
mod repository;

pub use postgres_repository::{PostgresConfig, PostgresUserRepository};
pub use repository::InMemoryUserRepository;

use crate::domain::user::NewUser;

/// The five users the demo database starts with
pub fn sample_users() -> Vec<NewUser> {
    vec![
        NewUser::new("Alice Johnson", "alice@example.com", 28),
        NewUser::new("Bob Smith", "bob@example.com", 34),
        NewUser::new("Charlie Brown", "charlie@example.com", 22),
        NewUser::new("Diana Wilson", "diana@example.com", 31),
        NewUser::new("Eve Davis", "eve@example.com", 26),
    ]
}
