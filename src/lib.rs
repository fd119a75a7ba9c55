pub mod base;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-export collaborator traits
pub use base::repository_traits::{
    CategoryStore,
    FavoritesIndex,
    PhraseLookup,
};

// Re-export models
pub use models::{
    category::{Category, CategoryId},
    phrase::{Phrase, PhraseId},
};

pub use config::Config;
pub use data::Database;
pub use error::CacheError;
pub use services::{CategoryService, RemovalReport, SyncService};
