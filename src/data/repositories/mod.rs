mod category_repository;
mod favorites_repository;
mod phrase_repository;

pub use category_repository::SqliteCategoryStore;
pub use favorites_repository::{EntityKind, FavoriteList, SqliteFavoritesRepository};
pub use phrase_repository::SqlitePhraseRepository;
