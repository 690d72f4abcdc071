//! Keyseq - a keyed, ordered record store for virtualized list views.
//!
//! Records are addressable both by position and by key. Every structural
//! change (insert, remove, move, sort) is reported to a [`sink::Sink`] so a
//! rendered projection of the list can stay in sync.
//!
//! # Quick Start
//!
//! ```
//! use keyseq::config::StoreConfig;
//! use keyseq::sink::Recorder;
//! use keyseq::store::KeyedStore;
//! use serde_json::json;
//!
//! let items = vec![
//!     json!({"key": "a", "v": 3}),
//!     json!({"key": "b", "v": 1}),
//!     json!({"key": "c", "v": 2}),
//! ];
//! let mut store = KeyedStore::with_sink(items, StoreConfig::default(), Recorder::new()).unwrap();
//!
//! store.sort(|x, y| x["v"].as_i64().cmp(&y["v"].as_i64()));
//! let keys: Vec<&str> = store.keys().map(|k| k.as_str()).collect();
//! assert_eq!(keys, ["b", "c", "a"]);
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod sink;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use key::{Key, Keyed};
pub use sink::{Notification, Recorder, Sink};
pub use store::{Fetch, KeyedStore, Record};
