use std::path::Path;
use std::sync::Arc;
use anyhow::{Context, Result};
use log::info;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::data::migration::MigrationManager;
use crate::data::repositories::{
    SqliteCategoryStore,
    SqliteFavoritesRepository,
    SqlitePhraseRepository,
};

pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Owns the connection pool and hands out the store implementations.
///
/// The category store is created once so that every caller shares the
/// same notification stream.
pub struct Database {
    connection_pool: Arc<ConnectionPool>,
    category_store: Arc<SqliteCategoryStore>,
}

impl Database {
    /// Opens (or creates) the database file at `db_path` and migrates it
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening database at {}", db_path.display());
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);
        Self::with_manager(manager, 4)
    }

    /// A private in-memory database.
    ///
    /// Every in-memory connection is its own database, so the pool holds
    /// exactly one connection.
    pub fn in_memory() -> Result<Self> {
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    fn with_manager(manager: SqliteConnectionManager, max_size: u32) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .context("Failed to build connection pool")?;

        {
            let conn = pool.get()?;
            MigrationManager::new(&conn).run_migrations()?;
        }

        let connection_pool = Arc::new(pool);
        let category_store = Arc::new(SqliteCategoryStore::new(connection_pool.clone()));
        Ok(Self {
            connection_pool,
            category_store,
        })
    }

    pub fn category_store(&self) -> Arc<SqliteCategoryStore> {
        self.category_store.clone()
    }

    pub fn phrase_repository(&self) -> Arc<SqlitePhraseRepository> {
        Arc::new(SqlitePhraseRepository::new(self.connection_pool.clone()))
    }

    pub fn favorites_repository(&self) -> Arc<SqliteFavoritesRepository> {
        Arc::new(SqliteFavoritesRepository::new(self.connection_pool.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_file_database() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("phraseboard.db");

        Database::new(&db_path)?;
        assert!(db_path.exists());

        // Reopening an already migrated file must succeed
        Database::new(&db_path)?;
        Ok(())
    }
}
