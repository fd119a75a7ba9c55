pub mod category;
pub mod phrase;

pub use category::{Category, CategoryId};
pub use phrase::{Phrase, PhraseId};
