//! Persistence for projects and binary assets.
//!
//! Two collaborator traits live here: [`store::ProjectStore`] for the
//! project document and [`blob::BlobStore`] for images. Each has a
//! Postgres/S3/filesystem implementation for production and an in-memory
//! implementation used when no database is configured and in tests.

use sqlx::postgres::PgPoolOptions;

pub mod blob;
pub mod error;
pub mod store;

pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore, S3BlobStore};
pub use error::{BlobError, StoreError};
pub use store::{MemoryProjectStore, PgProjectStore, ProjectStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
