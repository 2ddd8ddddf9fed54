use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Build the search pool over the least-privilege login (see
/// `DatabaseConfig`). Every session additionally pins
/// `default_transaction_read_only`, so statements from this pool refuse
/// writes even if the configured role is ever over-granted.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET default_transaction_read_only = on")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
