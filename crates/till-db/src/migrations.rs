//! Embedded schema migrations.
//!
//! Files live in `migrations/sqlite/` at the workspace root and are compiled
//! into the binary. New schema goes in a new `NNN_description.sql` file;
//! an applied file is never edited, since sqlx checksums it.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever is pending. Each file runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(known = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` counts. A fresh file with no history table reports
/// zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let has_history: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if has_history {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok((MIGRATOR.migrations.len(), applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_status_before_and_after_run() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();

        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(applied, 0);

        run_migrations(db.pool()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        assert_eq!(migration_status(db.pool()).await.unwrap(), (total, total));
    }
}
