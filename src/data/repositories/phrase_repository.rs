use std::sync::Arc;
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::base::repository_traits::PhraseLookup;
use crate::data::database::ConnectionPool;
use crate::models::category::{Category, CategoryId};
use crate::models::phrase::{Phrase, PhraseId};

pub struct SqlitePhraseRepository {
    connection_pool: Arc<ConnectionPool>,
}

impl SqlitePhraseRepository {
    pub fn new(connection_pool: Arc<ConnectionPool>) -> Self {
        Self { connection_pool }
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Phrase> {
        Ok(Phrase {
            id: PhraseId(row.get(0)?),
            name: row.get(1)?,
            image_url: row.get(2)?,
            category_id: CategoryId(row.get(3)?),
            created_at: row.get(4)?,
        })
    }

    /// Stores a phrase under its category
    pub async fn add_phrase(&self, phrase: &Phrase) -> Result<PhraseId> {
        self.connection_pool.get()?.execute(
            "INSERT INTO phrases (id, name, image_url, category_id, created_at) VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![
                phrase.id.0,
                phrase.name,
                phrase.image_url,
                phrase.category_id.0,
                phrase.created_at,
            ],
        ).with_context(|| format!("Failed to insert phrase '{}'", phrase.name))?;
        Ok(phrase.id.clone())
    }

    pub async fn get_all_phrases(&self) -> Result<Vec<Phrase>> {
        let conn = self.connection_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, image_url, category_id, created_at FROM phrases ORDER BY rowid",
        )?;
        let phrases = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(phrases)
    }
}

#[async_trait]
impl PhraseLookup for SqlitePhraseRepository {
    async fn get_phrases(&self, category: &Category) -> Result<Vec<Phrase>> {
        let conn = self.connection_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, image_url, category_id, created_at
             FROM phrases
             WHERE category_id = ?
             ORDER BY rowid",
        )?;
        let phrases = stmt
            .query_map([&category.id.0], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read phrases of category {}", category.id))?;
        Ok(phrases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;

    #[tokio::test]
    async fn test_get_phrases_filters_by_category() -> Result<()> {
        let database = Database::in_memory()?;
        let repository = database.phrase_repository();

        let mut food = Category::new("Food".to_string());
        food.id = CategoryId::from("1");
        let mut drinks = Category::new("Drinks".to_string());
        drinks.id = CategoryId::from("2");

        repository.add_phrase(&Phrase::new("Bread".to_string(), food.id.clone())).await?;
        repository.add_phrase(&Phrase::new("Apple".to_string(), food.id.clone())).await?;
        repository.add_phrase(&Phrase::new("Water".to_string(), drinks.id.clone())).await?;

        let phrases = repository.get_phrases(&food).await?;
        let names: Vec<_> = phrases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bread", "Apple"]);
        assert!(phrases.iter().all(|p| p.belongs_to(&food.id)));
        assert_eq!(repository.get_all_phrases().await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_category_has_no_phrases() -> Result<()> {
        let database = Database::in_memory()?;
        let repository = database.phrase_repository();

        let mut unknown = Category::new("Nowhere".to_string());
        unknown.id = CategoryId::new();
        assert!(repository.get_phrases(&unknown).await?.is_empty());
        Ok(())
    }
}
