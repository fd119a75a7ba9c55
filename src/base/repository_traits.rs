use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::category::{Category, CategoryId};
use crate::models::phrase::Phrase;

// ==================== CategoryStore ====================
/// Gateway to the document store that owns categories and phrases.
///
/// Every call either succeeds durably or fails; partial writes are never
/// exposed. Hierarchy changes are announced on the `subscribe()` stream.
/// The cache reads that stream while it refreshes, and continuously once
/// `CategoryService::follow_store` is running.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Subscribes to full-hierarchy notifications
    fn subscribe(&self) -> broadcast::Receiver<Vec<Category>>;

    /// Asks the store to publish its current hierarchy on the notification stream
    async fn import_categories(&self) -> Result<()>;

    /// Creates a category and returns the id the store assigned to it
    async fn add_category(&self, category: &Category) -> Result<CategoryId>;

    /// Overwrites a stored category with the given object
    async fn update_category(&self, category: &Category) -> Result<()>;

    /// Deletes a category record
    async fn remove_category(&self, category: &Category) -> Result<()>;

    /// Deletes a phrase record
    async fn remove_phrase(&self, phrase: &Phrase) -> Result<()>;
}

// ==================== PhraseLookup ====================
#[async_trait]
pub trait PhraseLookup: Send + Sync {
    /// Phrases whose back-reference is `category.id`; empty for unknown categories
    async fn get_phrases(&self, category: &Category) -> Result<Vec<Phrase>>;
}

// ==================== FavoritesIndex ====================
/// Favorite and common membership. Removing a non-member is a no-op.
#[async_trait]
pub trait FavoritesIndex: Send + Sync {
    async fn remove_favorite_category(&self, category: &Category) -> Result<()>;

    async fn remove_from_common_category(&self, category: &Category) -> Result<()>;

    async fn remove_favorite_phrase(&self, phrase: &Phrase) -> Result<()>;

    async fn remove_from_common_phrase(&self, phrase: &Phrase) -> Result<()>;
}
