use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a category, assigned by the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        CategoryId(value)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        CategoryId(value.to_string())
    }
}

impl CategoryId {
    /// Generates a fresh store id
    pub fn new() -> Self {
        CategoryId(Uuid::new_v4().to_string())
    }

    /// True until the store has assigned an id
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }
}

/// A top-level category or a sub-category of one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Store-assigned identifier, empty before creation
    #[serde(default)]
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Parent category, `None` for top-level categories.
    /// Stored as `""` when absent.
    #[serde(rename = "parentCategoryID", default, with = "parent_sentinel")]
    pub parent_category_id: Option<CategoryId>,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
    #[serde(default)]
    pub is_fav: bool,
    #[serde(default = "default_visibility")]
    pub visibility: bool,
    #[serde(default)]
    pub views: u64,
    /// Display position within the sibling sequence
    #[serde(default)]
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_visibility() -> bool {
    true
}

impl Category {
    /// Creates a new, not yet stored, top-level category
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::default(),
            name,
            parent_category_id: None,
            image_url: String::new(),
            is_fav: false,
            visibility: true,
            views: 0,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Makes this a sub-category of `parent_id`
    pub fn with_parent_id(mut self, parent_id: CategoryId) -> Self {
        self.parent_category_id = Some(parent_id);
        self.updated_at = Utc::now();
        self
    }

    pub fn with_image_url(mut self, image_url: String) -> Self {
        self.image_url = image_url;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_category_id.is_none()
    }

    /// Whether this category is a direct child of `parent_id`
    pub fn is_child_of(&self, parent_id: &CategoryId) -> bool {
        self.parent_category_id.as_ref() == Some(parent_id)
    }

    /// Updates the category's last update time
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Maps `None` to the `""` sentinel used by the document format.
mod parent_sentinel {
    use super::CategoryId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<CategoryId>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_str(&id.0),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<CategoryId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(CategoryId))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_creation() {
        let name = "Food".to_string();
        let category = Category::new(name.clone());

        assert_eq!(category.name, name);
        assert!(category.id.is_unassigned());
        assert!(category.is_top_level());
        assert!(category.visibility);
        assert_eq!(category.views, 0);
    }

    #[test]
    fn test_category_with_parent() {
        let parent_id = CategoryId::new();
        let category = Category::new("Fruit".to_string())
            .with_parent_id(parent_id.clone());

        assert!(!category.is_top_level());
        assert!(category.is_child_of(&parent_id));
        assert!(!category.is_child_of(&CategoryId::new()));
    }

    #[test]
    fn test_empty_parent_sentinel_round_trip() {
        let json = r#"{
            "id": "1",
            "name": "Food",
            "parentCategoryID": "",
            "imageURL": "",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let category: Category = serde_json::from_str(json).unwrap();
        assert!(category.is_top_level());
        assert!(category.visibility);

        let value = serde_json::to_value(&category).unwrap();
        assert_eq!(value["parentCategoryID"], "");
    }

    #[test]
    fn test_child_parent_serialized_as_id() {
        let category = Category::new("Fruit".to_string()).with_parent_id("1".into());
        let value = serde_json::to_value(&category).unwrap();
        assert_eq!(value["parentCategoryID"], "1");
    }
}
