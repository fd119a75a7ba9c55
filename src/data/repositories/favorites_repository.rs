use std::sync::Arc;
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::OptionalExtension;

use crate::base::repository_traits::FavoritesIndex;
use crate::data::database::ConnectionPool;
use crate::models::category::Category;
use crate::models::phrase::Phrase;

/// Which kind of entity a favorites row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Phrase,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Phrase => "phrase",
        }
    }
}

/// The two membership sets kept by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteList {
    /// Picked by the user
    Favorite,
    /// Frequently used
    Common,
}

impl FavoriteList {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteList::Favorite => "favorite",
            FavoriteList::Common => "common",
        }
    }
}

pub struct SqliteFavoritesRepository {
    connection_pool: Arc<ConnectionPool>,
}

impl SqliteFavoritesRepository {
    pub fn new(connection_pool: Arc<ConnectionPool>) -> Self {
        Self { connection_pool }
    }

    /// Adds an entity to a list; adding twice is a no-op
    pub fn add(&self, kind: EntityKind, list: FavoriteList, entity_id: &str) -> Result<()> {
        self.connection_pool.get()?.execute(
            "INSERT OR IGNORE INTO favorites (entity_kind, list, entity_id) VALUES (?, ?, ?)",
            [kind.as_str(), list.as_str(), entity_id],
        )?;
        Ok(())
    }

    pub fn contains(&self, kind: EntityKind, list: FavoriteList, entity_id: &str) -> Result<bool> {
        let found = self
            .connection_pool
            .get()?
            .query_row(
                "SELECT 1 FROM favorites WHERE entity_kind = ? AND list = ? AND entity_id = ?",
                [kind.as_str(), list.as_str(), entity_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Ids on a list, in insertion order
    pub fn members(&self, kind: EntityKind, list: FavoriteList) -> Result<Vec<String>> {
        let conn = self.connection_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT entity_id FROM favorites WHERE entity_kind = ? AND list = ? ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map([kind.as_str(), list.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn remove(&self, kind: EntityKind, list: FavoriteList, entity_id: &str) -> Result<()> {
        self.connection_pool.get()?.execute(
            "DELETE FROM favorites WHERE entity_kind = ? AND list = ? AND entity_id = ?",
            [kind.as_str(), list.as_str(), entity_id],
        )?;
        Ok(())
    }
}

#[async_trait]
impl FavoritesIndex for SqliteFavoritesRepository {
    async fn remove_favorite_category(&self, category: &Category) -> Result<()> {
        self.remove(EntityKind::Category, FavoriteList::Favorite, &category.id.0)
    }

    async fn remove_from_common_category(&self, category: &Category) -> Result<()> {
        self.remove(EntityKind::Category, FavoriteList::Common, &category.id.0)
    }

    async fn remove_favorite_phrase(&self, phrase: &Phrase) -> Result<()> {
        self.remove(EntityKind::Phrase, FavoriteList::Favorite, &phrase.id.0)
    }

    async fn remove_from_common_phrase(&self, phrase: &Phrase) -> Result<()> {
        self.remove(EntityKind::Phrase, FavoriteList::Common, &phrase.id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::models::category::CategoryId;

    #[tokio::test]
    async fn test_remove_category_from_both_lists() -> Result<()> {
        let database = Database::in_memory()?;
        let favorites = database.favorites_repository();
        let mut category = Category::new("Food".to_string());
        category.id = CategoryId::from("1");

        favorites.add(EntityKind::Category, FavoriteList::Favorite, "1")?;
        favorites.add(EntityKind::Category, FavoriteList::Common, "1")?;

        favorites.remove_favorite_category(&category).await?;
        assert!(!favorites.contains(EntityKind::Category, FavoriteList::Favorite, "1")?);
        assert!(favorites.contains(EntityKind::Category, FavoriteList::Common, "1")?);

        favorites.remove_from_common_category(&category).await?;
        assert!(favorites.members(EntityKind::Category, FavoriteList::Common)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_removal_is_idempotent() -> Result<()> {
        let database = Database::in_memory()?;
        let favorites = database.favorites_repository();
        let phrase = Phrase::new("Water".to_string(), "1".into());

        favorites.remove_favorite_phrase(&phrase).await?;
        favorites.remove_from_common_phrase(&phrase).await?;

        favorites.add(EntityKind::Phrase, FavoriteList::Favorite, &phrase.id.0)?;
        favorites.add(EntityKind::Phrase, FavoriteList::Favorite, &phrase.id.0)?;
        assert_eq!(favorites.members(EntityKind::Phrase, FavoriteList::Favorite)?.len(), 1);

        favorites.remove_favorite_phrase(&phrase).await?;
        favorites.remove_favorite_phrase(&phrase).await?;
        assert!(!favorites.contains(EntityKind::Phrase, FavoriteList::Favorite, &phrase.id.0)?);
        Ok(())
    }

    #[test]
    fn test_kind_keys_do_not_collide() -> Result<()> {
        let database = Database::in_memory()?;
        let favorites = database.favorites_repository();

        favorites.add(EntityKind::Category, FavoriteList::Favorite, "1")?;
        assert!(!favorites.contains(EntityKind::Phrase, FavoriteList::Favorite, "1")?);
        Ok(())
    }
}
