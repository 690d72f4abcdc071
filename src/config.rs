//! Store options.
//!
//! Parsed from the host's options object, with defaults for anything left
//! out.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const DEFAULT_KEY_FIELD: &str = "key";

/// Options a store is built with.
///
/// Deserializes from the host's options object, e.g.
/// `{"useBinding": true, "keyField": "id"}`. Missing fields take defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Pass every payload through the store's binder when (re)building.
    pub use_binding: bool,
    /// Payload field keys are derived from.
    pub key_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        return StoreConfig {
            use_binding: false,
            key_field: DEFAULT_KEY_FIELD.to_string(),
        };
    }
}

impl StoreConfig {
    pub fn from_json(options: &str) -> Result<StoreConfig, StoreError> {
        return Ok(serde_json::from_str(options)?);
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> StoreConfig {
        self.key_field = field.into();
        return self;
    }

    pub fn with_binding(mut self, use_binding: bool) -> StoreConfig {
        self.use_binding = use_binding;
        return self;
    }
}
