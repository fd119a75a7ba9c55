use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::category::CategoryId;

/// A unique identifier for a phrase
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhraseId(pub String);

impl fmt::Display for PhraseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PhraseId {
    fn from(value: &str) -> Self {
        PhraseId(value.to_string())
    }
}

/// A phrase belonging to exactly one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    /// The unique identifier of the phrase
    #[serde(default)]
    pub id: PhraseId,

    /// The text spoken or shown for the phrase
    pub name: String,

    #[serde(rename = "imageURL", default)]
    pub image_url: String,

    /// Back-reference to the owning category
    #[serde(rename = "categoryID")]
    pub category_id: CategoryId,

    pub created_at: DateTime<Utc>,
}

impl Phrase {
    /// Creates a new phrase under the given category
    pub fn new(name: String, category_id: CategoryId) -> Self {
        Self {
            id: PhraseId(Uuid::new_v4().to_string()),
            name,
            image_url: String::new(),
            category_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_image_url(mut self, image_url: String) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn belongs_to(&self, category_id: &CategoryId) -> bool {
        &self.category_id == category_id
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
