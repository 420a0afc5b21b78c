/// Database abstraction layer
///
/// Services, check history and notification state live in a local LibSQL file.
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;

pub use error::DatabaseError;
pub use repository::{Database, DatabaseImpl};

use crate::pool::{LibsqlPool, open_pool};

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> error::Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the pool at `path` and bring its schema up to date
pub async fn connect(path: impl AsRef<std::path::Path>, max_connections: usize) -> error::Result<DatabaseImpl> {
    let pool: LibsqlPool = open_pool(path, max_connections).await?;
    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);
    Ok(DatabaseImpl::new_from_pool(pool))
}
