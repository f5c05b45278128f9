//! SQLite connection bootstrap. Migrations run on boot here rather than via
//! an out-of-band `pnpm db:migrate`-style command, since this service has no
//! separate ops pipeline to host one (see DESIGN.md).

use kme_core::errors::domain::DomainError;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

pub async fn connect_and_migrate(sqlite_url: &str) -> Result<DatabaseConnection, DomainError> {
    let conn = Database::connect(sqlite_url)
        .await
        .map_err(|e| DomainError::db(format!("failed to connect to {sqlite_url}: {e}")))?;
    Migrator::up(&conn, None)
        .await
        .map_err(|e| DomainError::db(format!("migration failed: {e}")))?;
    Ok(conn)
}
