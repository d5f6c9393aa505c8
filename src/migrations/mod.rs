// Migration runner
// Embedded Diesel migrations, run explicitly at startup behind a config flag.
// Schema changes only ever happen through versioned migrations; there is no
// ORM auto-sync and no table is ever dropped outside an explicit down.sql.

use crate::db::diesel_pool::MIGRATIONS;
use crate::BootError;
use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use tracing::{debug, info};

/// Whether migrations should run as part of process startup
pub fn should_run_migrations() -> bool {
    crate::app_config::config().run_migrations_on_boot
}

/// Run all pending Diesel migrations
/// Returns the number of migrations applied
pub async fn run_migrations() -> Result<usize, BootError> {
    info!("[MIGRATIONS] Starting migration process...");

    // MigrationHarness requires a sync connection
    let database_url = crate::app_config::config().database_url.clone();

    let applied_migrations =
        tokio::task::spawn_blocking(move || -> Result<usize, BootError> {
            debug!("[MIGRATIONS] Establishing sync connection for migrations...");

            let mut conn = PgConnection::establish(&database_url)
                .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

            let pending_migrations = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to check pending migrations: {}", e))?;

            let pending_count = pending_migrations.len();
            if pending_count == 0 {
                debug!("[MIGRATIONS] No pending migrations found");
                return Ok(0);
            }

            info!("[MIGRATIONS] Found {} pending migrations", pending_count);

            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;

            for migration in &applied {
                debug!("[MIGRATIONS] Applied migration: {}", migration);
            }

            Ok(applied.len())
        })
        .await
        .map_err(|e| format!("Migration task panicked: {}", e))??;

    info!(
        "[MIGRATIONS] Successfully applied {} migrations",
        applied_migrations
    );

    Ok(applied_migrations)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The migration result must propagate through `?` in the startup path,
    // which returns the same BootError
    #[test]
    fn test_migration_failure_propagates_as_boot_error() {
        fn boot(step: Result<usize, BootError>) -> Result<(), BootError> {
            let applied = step?;
            let _ = applied;
            Ok(())
        }

        assert!(boot(Err("connection refused".into())).is_err());
        assert!(boot(Ok(2)).is_ok());
    }
}
