//! Postgres pool construction and schema health probing.

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

/// Shared Postgres connection pool
pub type DbPool = Pool<Postgres>;

/// Build the shared connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "connection pool ready"
    );

    Ok(pool)
}

/// Verify the pool can serve reservation traffic: both tables must be
/// reachable. Called after migrations have run.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts")
        .fetch_one(pool)
        .await?;

    info!(books, active_carts = carts, "reservation schema reachable");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_pool_and_health_check() {
        let config = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/bookshop".to_string()),
            max_connections: 5,
            min_connections: 2,
        };

        let pool = create_pool(&config).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        assert!(health_check(&pool).await.is_ok());
    }
}
