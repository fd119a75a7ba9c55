use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use anyhow::anyhow;
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;

use crate::base::repository_traits::{CategoryStore, FavoritesIndex, PhraseLookup};
use crate::error::{CacheError, Result};
use crate::models::category::{Category, CategoryId};
use crate::models::phrase::Phrase;
use crate::services::category::partition::{Partition, PhraseSet};

/// Outcome of a cascading removal.
///
/// Individual store or favorites failures do not stop the cascade; they are
/// collected here instead.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    pub categories_removed: usize,
    pub phrases_removed: usize,
    pub failures: Vec<String>,
}

impl RemovalReport {
    /// True when every step of the cascade succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, action: String, result: anyhow::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("{} failed: {:#}", action, e);
                self.failures.push(format!("{}: {:#}", action, e));
                false
            }
        }
    }
}

struct Shared {
    store: Arc<dyn CategoryStore>,
    phrases: Arc<dyn PhraseLookup>,
    favorites: Arc<dyn FavoritesIndex>,
    partition: RwLock<Partition>,
    known_phrases: Mutex<PhraseSet>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

// Locks are never held across an await, so a poisoned lock only means a
// panic mid-update; the data is still usable.
impl Shared {
    fn partition(&self) -> RwLockReadGuard<'_, Partition> {
        self.partition.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn partition_mut(&self) -> RwLockWriteGuard<'_, Partition> {
        self.partition.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn known_phrases(&self) -> MutexGuard<'_, PhraseSet> {
        self.known_phrases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn background(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.background.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory view of the category hierarchy, kept in step with the store.
///
/// Cloning is cheap and every clone shares the same cache. Structural
/// changes go through the store followed by a full reconciliation; scalar
/// setters patch the cached object and push it in the background. Outside a
/// Tokio runtime the push is skipped and logged, the local change stays.
///
/// The store's notification stream is only read during `refresh()`. Call
/// `follow_store()` to also apply hierarchies the store announces on its own.
#[derive(Clone)]
pub struct CategoryService {
    shared: Arc<Shared>,
}

impl CategoryService {
    /// Creates a service with an empty cache
    pub fn new(
        store: Arc<dyn CategoryStore>,
        phrases: Arc<dyn PhraseLookup>,
        favorites: Arc<dyn FavoritesIndex>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                phrases,
                favorites,
                partition: RwLock::new(Partition::default()),
                known_phrases: Mutex::new(PhraseSet::default()),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a service and loads the hierarchy once
    pub async fn connect(
        store: Arc<dyn CategoryStore>,
        phrases: Arc<dyn PhraseLookup>,
        favorites: Arc<dyn FavoritesIndex>,
    ) -> Result<Self> {
        let service = Self::new(store, phrases, favorites);
        service.refresh().await?;
        Ok(service)
    }

    /// Reimports the hierarchy and replaces the cached partition.
    ///
    /// Phrase merges for each category run in the background; the returned
    /// top-level sequence does not wait for them. When several refreshes
    /// overlap, the one that finishes last wins.
    pub async fn refresh(&self) -> Result<Vec<Category>> {
        let mut updates = self.shared.store.subscribe();
        self.shared.store.import_categories().await?;

        let categories = newest_hierarchy(&mut updates).await?;
        Ok(self.apply_hierarchy(categories))
    }

    /// Applies every hierarchy the store announces, until the stream closes
    /// or the returned task is aborted.
    pub fn follow_store(&self) -> Result<JoinHandle<()>> {
        let runtime = Handle::try_current()
            .map_err(|e| anyhow!(e).context("following the store needs a Tokio runtime"))?;
        let mut updates = self.shared.store.subscribe();
        let service = self.clone();

        info!("Following category store notifications");
        Ok(runtime.spawn(async move {
            loop {
                match newest_hierarchy(&mut updates).await {
                    Ok(categories) => {
                        service.apply_hierarchy(categories);
                    }
                    Err(e) => {
                        info!("Stopped following the category store: {}", e);
                        break;
                    }
                }
            }
        }))
    }

    /// Replaces the cached partition and starts the phrase merges
    fn apply_hierarchy(&self, categories: Vec<Category>) -> Vec<Category> {
        for category in &categories {
            self.spawn_phrase_merge(category.clone());
        }

        let partition = Partition::from_import(categories);
        for problem in partition.inconsistencies() {
            warn!("{}", problem);
        }

        let top_level = partition.top_level().to_vec();
        info!(
            "Reconciled {} categories ({} top-level, {} sub-categories)",
            partition.len(),
            top_level.len(),
            partition.sub_categories().len()
        );
        *self.shared.partition_mut() = partition;
        top_level
    }

    /// Waits for every background task started so far, including tasks
    /// those tasks start.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.shared.background());
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    error!("Background task failed: {}", e);
                }
            }
        }
    }

    // ---- lookups ----

    /// Child of `parent_id` with exactly this name, first in cache order
    pub async fn find_sub_category(&self, parent_id: &CategoryId, name: &str) -> Result<Category> {
        self.shared
            .partition()
            .children_of(parent_id)
            .find(|category| category.name == name)
            .cloned()
            .ok_or_else(|| CacheError::sub_category_not_found(format!("{}/{}", parent_id, name)))
    }

    pub async fn list_sub_categories(&self, parent_id: &CategoryId) -> Vec<Category> {
        self.shared.partition().children_of(parent_id).cloned().collect()
    }

    /// Top-level category by exact name
    pub async fn find_category_by_name(&self, name: &str) -> Result<Category> {
        self.shared
            .partition()
            .top_level_by_name(name)
            .cloned()
            .ok_or_else(|| CacheError::category_not_found(name))
    }

    /// Top-level category by id. Fails with `NotFound` like the name lookup.
    pub async fn find_category_by_id(&self, id: &CategoryId) -> Result<Category> {
        self.shared
            .partition()
            .top_level_by_id(id)
            .cloned()
            .ok_or_else(|| CacheError::category_not_found(id.to_string()))
    }

    pub fn top_level(&self) -> Vec<Category> {
        self.shared.partition().top_level().to_vec()
    }

    pub fn sub_categories(&self) -> Vec<Category> {
        self.shared.partition().sub_categories().to_vec()
    }

    /// Every phrase merged so far. Eventually complete after a refresh.
    pub fn all_known_phrases(&self) -> Vec<Phrase> {
        self.shared.known_phrases().as_slice().to_vec()
    }

    // ---- ordering ----

    /// Numbers both sequences by position and pushes the categories whose
    /// order changed. Returns how many were pushed.
    pub fn reorder_all(&self) -> usize {
        let changed = self.shared.partition_mut().reorder();
        let count = changed.len();
        for category in changed {
            self.push_update(category);
        }
        debug!("Reordered categories, {} changed", count);
        count
    }

    // ---- structural mutations ----

    /// Creates the category in the store and returns its new id.
    ///
    /// Unless `skip_refresh` is set, a reconciliation is started in the
    /// background; the new category may not be cached yet when this returns.
    pub async fn add_category(&self, category: Category, skip_refresh: bool) -> Result<CategoryId> {
        let id = self.shared.store.add_category(&category).await?;
        info!("Added category '{}' as {}", category.name, id);

        if !skip_refresh {
            self.spawn_refresh();
        }
        Ok(id)
    }

    /// Removes a category together with everything that depends on it.
    ///
    /// For a top-level category the hierarchy is reconciled first, so
    /// children added with `skip_refresh` are included. Its sub-categories
    /// go first, each with its phrases and favorites entries. Every step is
    /// awaited in order. A failing step is logged and recorded in the report
    /// and the cascade goes on. Ends with a full reconciliation.
    pub async fn remove_category(&self, category: &Category) -> Result<RemovalReport> {
        let mut report = RemovalReport::default();

        if category.is_top_level() {
            self.refresh().await?;
            let children: Vec<Category> = self
                .shared
                .partition()
                .children_of(&category.id)
                .cloned()
                .collect();

            for child in &children {
                self.unlist_category(child, &mut report).await;
                self.remove_phrases_of(child, &mut report).await;
                self.remove_record(child, &mut report).await;
            }
        }

        self.unlist_category(category, &mut report).await;
        self.remove_phrases_of(category, &mut report).await;
        self.remove_record(category, &mut report).await;

        if report.is_complete() {
            info!(
                "Removed category {} with {} categories and {} phrases",
                category.id, report.categories_removed, report.phrases_removed
            );
        } else {
            warn!(
                "Removed category {} with {} failed steps",
                category.id,
                report.failures.len()
            );
        }

        self.refresh().await?;
        Ok(report)
    }

    async fn unlist_category(&self, category: &Category, report: &mut RemovalReport) {
        let favorites = &self.shared.favorites;
        report.record(
            format!("unfavoriting category {}", category.id),
            favorites.remove_favorite_category(category).await,
        );
        report.record(
            format!("removing category {} from common", category.id),
            favorites.remove_from_common_category(category).await,
        );
    }

    async fn remove_phrases_of(&self, category: &Category, report: &mut RemovalReport) {
        let phrases = match self.shared.phrases.get_phrases(category).await {
            Ok(phrases) => phrases,
            Err(e) => {
                report.record(format!("loading phrases of category {}", category.id), Err(e));
                return;
            }
        };

        let favorites = &self.shared.favorites;
        for phrase in &phrases {
            if report.record(
                format!("removing phrase {}", phrase.id),
                self.shared.store.remove_phrase(phrase).await,
            ) {
                report.phrases_removed += 1;
            }
            report.record(
                format!("unfavoriting phrase {}", phrase.id),
                favorites.remove_favorite_phrase(phrase).await,
            );
            report.record(
                format!("removing phrase {} from common", phrase.id),
                favorites.remove_from_common_phrase(phrase).await,
            );
        }
    }

    async fn remove_record(&self, category: &Category, report: &mut RemovalReport) {
        if report.record(
            format!("removing category {}", category.id),
            self.shared.store.remove_category(category).await,
        ) {
            report.categories_removed += 1;
        }
    }

    // ---- scalar setters ----

    pub fn set_name(&self, id: &CategoryId, name: impl Into<String>) -> Result<Category> {
        let name = name.into();
        self.update_cached(id, |category| category.name = name)
    }

    pub fn set_url(&self, id: &CategoryId, image_url: impl Into<String>) -> Result<Category> {
        let image_url = image_url.into();
        self.update_cached(id, |category| category.image_url = image_url)
    }

    pub fn set_is_fav(&self, id: &CategoryId, is_fav: bool) -> Result<Category> {
        self.update_cached(id, |category| category.is_fav = is_fav)
    }

    pub fn set_order(&self, id: &CategoryId, order: i64) -> Result<Category> {
        self.update_cached(id, |category| category.order = order)
    }

    pub fn change_visibility(&self, id: &CategoryId) -> Result<Category> {
        self.update_cached(id, |category| category.visibility = !category.visibility)
    }

    /// Counts one more view of the category
    pub fn increase_views(&self, id: &CategoryId) -> Result<Category> {
        self.update_cached(id, |category| category.views += 1)
    }

    /// Moves a category under `parent`, or to the top level for `None`.
    ///
    /// The parent must be a cached top-level category and a category that
    /// has children cannot become a child itself.
    pub fn set_parent_category_id(&self, id: &CategoryId, parent: Option<CategoryId>) -> Result<Category> {
        let updated = {
            let mut partition = self.shared.partition_mut();
            if partition.get(id).is_none() {
                return Err(CacheError::category_not_found(id.to_string()));
            }
            if let Some(parent_id) = &parent {
                if parent_id == id {
                    return Err(CacheError::InconsistentState(format!(
                        "category {} cannot be its own parent",
                        id
                    )));
                }
                if partition.top_level_by_id(parent_id).is_none() {
                    return Err(CacheError::InconsistentState(format!(
                        "{} is not a top-level category",
                        parent_id
                    )));
                }
                if partition.has_children(id) {
                    return Err(CacheError::InconsistentState(format!(
                        "category {} has sub-categories and cannot become one",
                        id
                    )));
                }
            }

            let category = partition
                .get_mut(id)
                .ok_or_else(|| CacheError::category_not_found(id.to_string()))?;
            category.parent_category_id = parent;
            category.update_timestamp();
            let updated = category.clone();
            partition.relocate(id);
            updated
        };

        self.push_update(updated.clone());
        Ok(updated)
    }

    /// Replaces the cached copy (when there is one) and pushes the object
    pub fn update_category(&self, category: Category) {
        {
            let mut partition = self.shared.partition_mut();
            match partition.get_mut(&category.id) {
                Some(cached) => {
                    *cached = category.clone();
                    partition.relocate(&category.id);
                }
                None => debug!("Category {} is not cached, pushing only", category.id),
            }
        }
        self.push_update(category);
    }

    fn update_cached<F>(&self, id: &CategoryId, apply: F) -> Result<Category>
    where
        F: FnOnce(&mut Category),
    {
        let updated = {
            let mut partition = self.shared.partition_mut();
            let category = partition
                .get_mut(id)
                .ok_or_else(|| CacheError::category_not_found(id.to_string()))?;
            apply(category);
            category.update_timestamp();
            category.clone()
        };

        self.push_update(updated.clone());
        Ok(updated)
    }

    // ---- background work ----

    fn push_update(&self, category: Category) {
        let store = Arc::clone(&self.shared.store);
        let what = format!("push category {}", category.id);
        self.spawn_tracked(&what, async move {
            if let Err(e) = store.update_category(&category).await {
                error!("Failed to push category {} to the store: {:#}", category.id, e);
            }
        });
    }

    fn spawn_phrase_merge(&self, category: Category) {
        let shared = Arc::clone(&self.shared);
        let what = format!("merge phrases of category {}", category.id);
        self.spawn_tracked(&what, async move {
            match shared.phrases.get_phrases(&category).await {
                Ok(phrases) => {
                    let added = shared.known_phrases().merge(phrases);
                    debug!("Merged {} new phrases from category {}", added, category.id);
                }
                Err(e) => warn!("Could not load phrases of category {}: {:#}", category.id, e),
            }
        });
    }

    fn spawn_refresh(&self) {
        let service = self.clone();
        self.spawn_tracked("refresh", async move {
            if let Err(e) = service.refresh().await {
                error!("Background refresh failed: {}", e);
            }
        });
    }

    fn spawn_tracked<F>(&self, what: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(runtime) => self.track(runtime.spawn(task)),
            Err(e) => error!("Cannot {} outside a Tokio runtime: {}", what, e),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut background = self.shared.background();
        background.retain(|task| !task.is_finished());
        background.push(handle);
    }
}

/// Waits for the next hierarchy, then skips ahead to the newest one
/// already queued.
async fn newest_hierarchy(updates: &mut broadcast::Receiver<Vec<Category>>) -> Result<Vec<Category>> {
    let mut categories = loop {
        match updates.recv().await {
            Ok(categories) => break categories,
            Err(RecvError::Lagged(skipped)) => {
                debug!("Missed {} hierarchy notifications", skipped);
            }
            Err(RecvError::Closed) => {
                return Err(anyhow!("category notification stream closed").into());
            }
        }
    };

    loop {
        match updates.try_recv() {
            Ok(newer) => categories = newer,
            Err(TryRecvError::Lagged(skipped)) => {
                debug!("Missed {} hierarchy notifications", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    Ok(categories)
}
