use std::sync::Arc;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::broadcast;

use crate::base::repository_traits::CategoryStore;
use crate::data::database::ConnectionPool;
use crate::models::category::{Category, CategoryId};
use crate::models::phrase::Phrase;

const SELECT_CATEGORIES: &str =
    "SELECT id, name, parent_category_id, image_url, is_fav, visibility, views, sort_order, created_at, updated_at
     FROM categories
     ORDER BY sort_order, rowid";

/// SQLite-backed category store.
///
/// After an import and after every successful write the full hierarchy is
/// broadcast to subscribers.
pub struct SqliteCategoryStore {
    connection_pool: Arc<ConnectionPool>,
    updates: broadcast::Sender<Vec<Category>>,
}

impl SqliteCategoryStore {
    pub fn new(connection_pool: Arc<ConnectionPool>) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self { connection_pool, updates }
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        let parent: String = row.get(2)?;
        Ok(Category {
            id: row.get::<_, String>(0)?.into(),
            name: row.get(1)?,
            parent_category_id: if parent.is_empty() { None } else { Some(parent.into()) },
            image_url: row.get(3)?,
            is_fav: row.get(4)?,
            visibility: row.get(5)?,
            views: row.get::<_, i64>(6)? as u64,
            order: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Reads every stored category in display order
    pub fn get_all_categories(&self) -> Result<Vec<Category>> {
        let conn = self.connection_pool.get()?;
        let mut stmt = conn.prepare(SELECT_CATEGORIES)?;
        let categories = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read categories")?;
        Ok(categories)
    }

    fn publish(&self) -> Result<()> {
        let categories = self.get_all_categories()?;
        let count = categories.len();
        if self.updates.send(categories).is_err() {
            trace!("no subscribers for category update");
        } else {
            debug!("Published hierarchy with {} categories", count);
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for SqliteCategoryStore {
    fn subscribe(&self) -> broadcast::Receiver<Vec<Category>> {
        self.updates.subscribe()
    }

    async fn import_categories(&self) -> Result<()> {
        self.publish()
    }

    async fn add_category(&self, category: &Category) -> Result<CategoryId> {
        let id = if category.id.is_unassigned() {
            CategoryId::new()
        } else {
            category.id.clone()
        };

        self.connection_pool.get()?.execute(
            "INSERT INTO categories (
                id, name, parent_category_id, image_url, is_fav, visibility, views, sort_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                id.0,
                category.name,
                category.parent_category_id.as_ref().map(|p| p.0.as_str()).unwrap_or(""),
                category.image_url,
                category.is_fav,
                category.visibility,
                category.views as i64,
                category.order,
                category.created_at,
                category.updated_at,
            ],
        ).with_context(|| format!("Failed to insert category '{}'", category.name))?;

        self.publish()?;
        Ok(id)
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let changed = self.connection_pool.get()?.execute(
            "UPDATE categories SET
                name = ?,
                parent_category_id = ?,
                image_url = ?,
                is_fav = ?,
                visibility = ?,
                views = ?,
                sort_order = ?,
                updated_at = ?
            WHERE id = ?",
            rusqlite::params![
                category.name,
                category.parent_category_id.as_ref().map(|p| p.0.as_str()).unwrap_or(""),
                category.image_url,
                category.is_fav,
                category.visibility,
                category.views as i64,
                category.order,
                category.updated_at,
                category.id.0,
            ],
        )?;
        if changed == 0 {
            anyhow::bail!("category {} does not exist", category.id);
        }

        self.publish()
    }

    async fn remove_category(&self, category: &Category) -> Result<()> {
        self.connection_pool
            .get()?
            .execute("DELETE FROM categories WHERE id = ?", [&category.id.0])?;
        self.publish()
    }

    async fn remove_phrase(&self, phrase: &Phrase) -> Result<()> {
        self.connection_pool
            .get()?
            .execute("DELETE FROM phrases WHERE id = ?", [&phrase.id.0])?;
        Ok(())
    }
}
