//! SQLite connection pool.
//!
//! Opening the pool pings the database and retries until it answers or the
//! attempts run out.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use super::DbError;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// Number of connection attempts made at startup before giving up.
pub const CONNECT_ATTEMPTS: u32 = 30;

/// Delay between startup connection attempts.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
}

/// Open the pool and ping it, retrying up to `attempts` times with `delay`
/// in between.
pub async fn create_pool(
    db_path: &Path,
    attempts: u32,
    delay: Duration,
) -> Result<DbPool, DbError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match ping(db_path).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt >= attempts => {
                return Err(DbError::Unreachable {
                    attempts,
                    source: e,
                })
            }
            Err(e) => {
                log::info!("database ping failed ({}). retry in {:?}", e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn ping(db_path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options(db_path))
        .await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}
