/**
 * Server Configuration
 *
 * Loads the optional Postgres pool. Without `DATABASE_URL`, or when the
 * connection fails, the server keeps running on in-memory stores.
 */

use sqlx::PgPool;

/// Connection pool if the database is configured and reachable
pub type DatabaseConfig = Option<PgPool>;

/// Connect to `database_url` and run the bundled migrations
///
/// Returns `None` when no URL is given, when connecting fails, or when the
/// migrations cannot be applied. Errors are logged, never propagated.
pub async fn load_database(database_url: Option<&str>) -> DatabaseConfig {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set. Using in-memory stores.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory stores.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    if let Err(e) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        tracing::warn!("Falling back to in-memory stores.");
        return None;
    }
    tracing::info!("Database ready");

    Some(pool)
}
