use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect_pg(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Fail fast on a bad DATABASE_URL instead of at the first request.
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}
