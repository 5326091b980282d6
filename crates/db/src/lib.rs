//! Storage backends for the catalog.
//!
//! - [`store::PgEntitySource`]: the relational store (PostgreSQL).
//! - [`local_cache::LocalCache`]: the file-backed mirror holding entities,
//!   favorites and user comments.
//!
//! Both implement [`explorer_core::source::EntitySource`].

use sqlx::postgres::PgPoolOptions;

pub mod local_cache;
pub mod models;
pub mod repositories;
pub mod store;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
