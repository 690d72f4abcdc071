//! Errors returned by [`KeyedStore`](crate::store::KeyedStore).
//!
//! Only construction, replacement, insertion and the two fetch operations
//! fail. Every other lookup miss is reported as `None` or `false`.

use crate::key::Key;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The input is not a sequence, or an item has no usable key.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `fetch_by_key` was given a key that is not in the store.
    #[error("key not found: {key}")]
    KeyNotFound { key: Key },

    /// `fetch_range` was given an anchor outside `[0, count)`.
    #[error("index {index} out of range for {count} records")]
    IndexNotFound { index: usize, count: usize },

    /// A record with this key is already present.
    #[error("duplicate key: {key}")]
    DuplicateKey { key: Key },

    /// The store options could not be parsed.
    #[error("invalid store config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

impl StoreError {
    /// The key carried by a key-related error.
    pub fn key(&self) -> Option<&Key> {
        match self {
            StoreError::KeyNotFound { key } | StoreError::DuplicateKey { key } => Some(key),
            _ => None,
        }
    }
}
