pub mod category_service;
pub mod partition;

pub use category_service::{CategoryService, RemovalReport};
pub use partition::{Partition, PhraseSet};
