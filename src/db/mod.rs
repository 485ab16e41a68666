//! Postgres pool and schema migrations.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` builds the one shared pool here before binding the listener, so no
//! kiosk or dashboard request is served against an unmigrated schema. The SQL
//! files under `src/db/migrations` are embedded at compile time.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("src/db/migrations");

/// Handlers waiting longer than this for a connection fail instead of piling up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    MIGRATOR.run(&pool).await?;
    tracing::info!(max_connections, migrations = MIGRATOR.iter().count(), "database ready");

    Ok(pool)
}
