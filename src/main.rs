use std::env;
use std::path::PathBuf;
use anyhow::Result;
use log::{info, warn};

use phraseboard::{utils, CategoryService, Config, Database, SyncService};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    env_logger::init();
    info!("Starting phraseboard...");

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    info!("Ensuring database directory exists...");
    utils::ensure_directory_exists(&config.database_path)?;
    let database = Database::new(&config.database_path)?;

    let store = database.category_store();
    let phrases = database.phrase_repository();
    let favorites = database.favorites_repository();

    let service = if config.refresh_on_start {
        CategoryService::connect(store, phrases, favorites).await?
    } else {
        CategoryService::new(store, phrases, favorites)
    };
    service.settle().await;

    let top_level = service.top_level();
    if top_level.is_empty() {
        warn!("No categories found in {}", config.database_path.display());
    }
    for category in &top_level {
        println!("{} ({} views)", category.name, category.views);
        for child in service.list_sub_categories(&category.id).await {
            println!("  {} ({} views)", child.name, child.views);
        }
    }
    println!("{} phrases known", service.all_known_phrases().len());

    if config.auto_refresh {
        let _follower = service.follow_store()?;
        let mut sync = SyncService::new(service.clone());
        sync.set_sync_interval(config.refresh_interval_secs);
        info!("Reconciling every {} seconds", config.refresh_interval_secs);
        sync.start().await?;
    }

    Ok(())
}
