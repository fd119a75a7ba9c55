pub mod category;
pub mod sync;

pub use category::{CategoryService, RemovalReport};
pub use sync::SyncService;
