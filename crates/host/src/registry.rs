//! Named factory registry.
//!
//! Call sites register a factory under a string identifier ahead of time and
//! later create values by that identifier. Looking up a name nobody
//! registered is an error, not an empty result.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no factory registered for {name:?}")]
    Unregistered { name: String },

    #[error("a factory is already registered for {name:?}")]
    AlreadyRegistered { name: String },
}

type Factory<T> = Box<dyn Fn() -> T>;

/// A map from identifier to factory.
pub struct Registry<T> {
    factories: FxHashMap<Box<str>, Factory<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T> Registry<T> {
    pub fn new() -> Registry<T> {
        return Registry {
            factories: FxHashMap::default(),
        };
    }

    /// Register `factory` under `name`. A name can only be registered once.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> T + 'static,
    {
        if self.factories.contains_key(name) {
            warn!(name, "duplicate registration");
            return Err(RegistryError::AlreadyRegistered { name: name.to_string() });
        }
        debug!(name, "registered factory");
        self.factories.insert(Box::from(name), Box::new(factory));
        return Ok(());
    }

    /// Create a fresh value from the factory registered under `name`.
    pub fn create(&self, name: &str) -> Result<T, RegistryError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => {
                warn!(name, "lookup of unregistered name");
                Err(RegistryError::Unregistered { name: name.to_string() })
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        return self.factories.contains_key(name);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|n| &**n).collect();
        names.sort_unstable();
        return names;
    }

    pub fn len(&self) -> usize {
        return self.factories.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.factories.is_empty();
    }
}
