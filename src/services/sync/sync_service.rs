use anyhow::Result;
use log::{info, error};
use tokio::time::{sleep, Duration};

use crate::services::category::CategoryService;

/// Periodically reconciles the category cache with the store
pub struct SyncService {
    category_service: CategoryService,
    auto_sync: bool,
    sync_interval: u64,
}

impl SyncService {
    /// Creates a new sync service
    pub fn new(category_service: CategoryService) -> Self {
        Self {
            category_service,
            auto_sync: true,
            sync_interval: 300, // Default to 5 minutes
        }
    }

    /// Sets whether auto-sync is enabled
    pub fn set_auto_sync(&mut self, enabled: bool) {
        self.auto_sync = enabled;
    }

    /// Sets the sync interval in seconds
    pub fn set_sync_interval(&mut self, interval: u64) {
        self.sync_interval = interval;
    }

    /// Runs reconciliations forever, one per interval.
    ///
    /// A failed reconciliation is logged and retried on the next tick.
    pub async fn start(&self) -> Result<()> {
        if !self.auto_sync {
            return Ok(());
        }

        loop {
            match self.category_service.refresh().await {
                Ok(top_level) => {
                    info!("Category sync completed, {} top-level categories", top_level.len());
                }
                Err(e) => {
                    error!("Category sync failed: {}", e);
                }
            }

            sleep(Duration::from_secs(self.sync_interval)).await;
        }
    }

    /// Reconciles once and waits for the phrase merges it started
    pub async fn sync_now(&self) -> Result<()> {
        self.category_service.refresh().await?;
        self.category_service.settle().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::base::CategoryStore;
    use crate::models::{Category, Phrase};

    #[tokio::test]
    async fn test_sync_now_picks_up_store_changes() -> Result<()> {
        let database = Database::in_memory()?;
        let store = database.category_store();
        let phrases = database.phrase_repository();
        let service = CategoryService::new(store.clone(), phrases.clone(), database.favorites_repository());
        let sync = SyncService::new(service.clone());

        sync.sync_now().await?;
        assert!(service.top_level().is_empty());

        // Written behind the cache's back
        let id = store.add_category(&Category::new("Food".to_string())).await?;
        phrases.add_phrase(&Phrase::new("Bread".to_string(), id.clone())).await?;

        sync.sync_now().await?;
        assert_eq!(service.top_level().len(), 1);
        assert_eq!(service.all_known_phrases().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_returns_when_disabled() -> Result<()> {
        let database = Database::in_memory()?;
        let service = CategoryService::new(
            database.category_store(),
            database.phrase_repository(),
            database.favorites_repository(),
        );
        let mut sync = SyncService::new(service);
        sync.set_auto_sync(false);

        sync.start().await
    }
}
