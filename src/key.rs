//! Record keys.
//!
//! A key is an opaque string. Payloads that carry their own key in a named
//! field implement [`Keyed`], which is how a store derives keys when the
//! caller does not supply one.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

/// An opaque record identifier. Cloning is a reference count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    pub fn new(key: impl AsRef<str>) -> Key {
        return Key(Arc::from(key.as_ref()));
    }

    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// An empty key counts as "no key": the store derives one from the
    /// payload instead.
    pub fn is_empty(&self) -> bool {
        return self.0.is_empty();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Key({:?})", &*self.0);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

impl Deref for Key {
    type Target = str;

    fn deref(&self) -> &str {
        return &self.0;
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        return &self.0;
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Key {
        return Key::new(key);
    }
}

impl From<String> for Key {
    fn from(key: String) -> Key {
        return Key(Arc::from(key));
    }
}

/// A payload that can produce its own key from a named field.
pub trait Keyed {
    /// Read `field` and turn it into a key, if the field holds something
    /// usable as one.
    fn key_field(&self, field: &str) -> Option<Key>;
}

impl Keyed for Value {
    fn key_field(&self, field: &str) -> Option<Key> {
        match self.get(field)? {
            Value::String(s) => Some(Key::new(s)),
            Value::Number(n) => Some(Key::from(n.to_string())),
            _ => None,
        }
    }
}
