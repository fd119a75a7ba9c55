use anyhow::{Result, Context};
use log::{info, debug};
use rusqlite::Connection;

/// Database migration manager that handles schema updates
pub struct MigrationManager<'a> {
    connection: &'a Connection,
}

impl<'a> MigrationManager<'a> {
    /// Creates a new migration manager
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    /// Run all necessary migrations to bring the schema up to date
    pub fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        self.create_migrations_table()?;

        self.migrate_create_categories()?;
        self.migrate_create_phrases()?;
        self.migrate_create_favorites()?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Creates the migrations table to track which migrations have been applied
    fn create_migrations_table(&self) -> Result<()> {
        debug!("Creating migrations table if it doesn't exist");

        self.connection.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL
            )",
            [],
        ).context("Failed to create migrations table")?;

        Ok(())
    }

    /// Checks if a migration has been applied
    fn is_migration_applied(&self, name: &str) -> Result<bool> {
        let count: i64 = self.connection
            .query_row(
                "SELECT COUNT(*) FROM migrations WHERE name = ?",
                [name],
                |row| row.get(0),
            )
            .context("Failed to check if migration has been applied")?;

        Ok(count > 0)
    }

    /// Records that a migration has been applied
    fn record_migration(&self, name: &str) -> Result<()> {
        debug!("Recording migration '{}' as applied", name);

        self.connection
            .execute(
                "INSERT INTO migrations (name, applied_at) VALUES (?, datetime('now'))",
                [name],
            )
            .context("Failed to record migration")?;

        Ok(())
    }

    /// Runs `sql` once under `name`
    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        if self.is_migration_applied(name)? {
            debug!("Migration '{}' already recorded as applied, skipping", name);
            return Ok(());
        }

        info!("Running migration: {}", name);
        self.connection
            .execute_batch(sql)
            .with_context(|| format!("Failed to apply migration '{}'", name))?;
        self.record_migration(name)
    }

    fn migrate_create_categories(&self) -> Result<()> {
        self.apply(
            "create_categories",
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_category_id TEXT NOT NULL DEFAULT '',
                image_url TEXT NOT NULL DEFAULT '',
                is_fav INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                visibility INTEGER NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories(parent_category_id);",
        )
    }

    fn migrate_create_phrases(&self) -> Result<()> {
        self.apply(
            "create_phrases",
            "CREATE TABLE IF NOT EXISTS phrases (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                category_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_phrases_category ON phrases(category_id);",
        )
    }

    fn migrate_create_favorites(&self) -> Result<()> {
        self.apply(
            "create_favorites",
            "CREATE TABLE IF NOT EXISTS favorites (
                entity_kind TEXT NOT NULL,
                list TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                PRIMARY KEY (entity_kind, list, entity_id)
            );",
        )
    }
}
