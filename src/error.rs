use thiserror::Error;

/// Errors surfaced by the category cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A lookup matched nothing in the cache.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The store or favorites index rejected a request.
    #[error("category store request failed: {0:#}")]
    Gateway(#[from] anyhow::Error),

    /// The hierarchy breaks the two-level parent/child rule.
    #[error("inconsistent category hierarchy: {0}")]
    InconsistentState(String),
}

impl CacheError {
    pub fn category_not_found(key: impl Into<String>) -> Self {
        CacheError::NotFound { kind: "category", key: key.into() }
    }

    pub fn sub_category_not_found(key: impl Into<String>) -> Self {
        CacheError::NotFound { kind: "sub-category", key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
