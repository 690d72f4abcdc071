//! The keyed record store.
//!
//! Records live in a `Vec` that defines view order, with a hash index from
//! key to position alongside it. The two are kept in lockstep by every
//! mutation: `index[records[i].key] == i` for every `i`, and the index has
//! no other entries.
//!
//! Sorting reorders the `Vec` in one pass and then replays the difference to
//! the sink as individual moves, because a list view only understands
//! incremental changes. Keys whose record was already put in place by the
//! sort sit in a pending set; a move primitive that finds its key there
//! skips the splice and only emits the notification.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::key::{Key, Keyed};
use crate::sink::Sink;

/// Projection applied to payloads as they enter the store.
pub type Binder<V> = Box<dyn Fn(V) -> V>;

/// One key-payload pair owned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<V> {
    pub key: Key,
    pub payload: V,
}

/// Where a move primitive puts its record.
#[derive(Clone, Copy, Debug)]
enum Target<'a> {
    Start,
    End,
    After(&'a str),
}

/// Result of `fetch_range` and `fetch_by_key`.
///
/// `items` is always the whole sequence regardless of the requested window;
/// consumers rely on receiving the full list.
#[derive(Debug)]
pub struct Fetch<'a, V> {
    pub items: &'a [Record<V>],
    /// Position of the anchor within `items`.
    pub offset: usize,
    /// Position of the anchor within the store.
    pub absolute_index: usize,
    pub total_count: usize,
}

/// An ordered collection of records addressable by position and by key.
pub struct KeyedStore<V, S = ()> {
    records: Vec<Record<V>>,
    index: FxHashMap<Key, usize>,
    config: StoreConfig,
    binder: Option<Binder<V>>,
    sink: S,
    editing: bool,
    /// Keys already in their final slot that still owe the sink a move.
    pending: FxHashSet<Key>,
    /// The sink's view of the order while a sort replays its moves.
    projection: Option<Vec<Key>>,
}

/// Closes the batch an `edit` call opened, on return or on unwind.
struct EditScope<'a, V, S: Sink> {
    store: &'a mut KeyedStore<V, S>,
    opened: bool,
}

impl<V, S: Sink> Drop for EditScope<'_, V, S> {
    fn drop(&mut self) {
        self.store.projection = None;
        self.store.pending.clear();
        if self.opened && self.store.editing {
            self.store.editing = false;
            debug!("end edit");
            self.store.sink.end_batch();
        }
    }
}

/// Builds a store with a custom sink or binder.
pub struct StoreBuilder<V, S = ()> {
    config: StoreConfig,
    binder: Option<Binder<V>>,
    sink: S,
}

impl<V: Keyed> StoreBuilder<V, ()> {
    pub fn new(config: StoreConfig) -> StoreBuilder<V, ()> {
        return StoreBuilder {
            config,
            binder: None,
            sink: (),
        };
    }
}

impl<V: Keyed, S: Sink> StoreBuilder<V, S> {
    pub fn sink<T: Sink>(self, sink: T) -> StoreBuilder<V, T> {
        return StoreBuilder {
            config: self.config,
            binder: self.binder,
            sink,
        };
    }

    /// Install the projection used when `use_binding` is set.
    pub fn binder<F>(mut self, binder: F) -> StoreBuilder<V, S>
    where
        F: Fn(V) -> V + 'static,
    {
        self.binder = Some(Box::new(binder));
        return self;
    }

    pub fn build(self, items: Vec<V>) -> Result<KeyedStore<V, S>, StoreError> {
        let (records, index) = build_records(items, &self.config, self.binder.as_ref())?;
        debug!(count = records.len(), key_field = %self.config.key_field, "built store");
        let store = KeyedStore {
            records,
            index,
            config: self.config,
            binder: self.binder,
            sink: self.sink,
            editing: false,
            pending: FxHashSet::default(),
            projection: None,
        };
        store.check_invariants();
        return Ok(store);
    }
}

impl<S: Sink> StoreBuilder<Value, S> {
    /// Build from a JSON value: an array of records, or `null` for none.
    pub fn build_json(self, items: Value) -> Result<KeyedStore<Value, S>, StoreError> {
        let items = json_items(items)?;
        return self.build(items);
    }
}

impl<V: Keyed> KeyedStore<V, ()> {
    pub fn new(items: Vec<V>, config: StoreConfig) -> Result<KeyedStore<V, ()>, StoreError> {
        return StoreBuilder::new(config).build(items);
    }

    pub fn builder(config: StoreConfig) -> StoreBuilder<V, ()> {
        return StoreBuilder::new(config);
    }
}

impl KeyedStore<Value, ()> {
    pub fn from_json(items: Value, config: StoreConfig) -> Result<KeyedStore<Value, ()>, StoreError> {
        return StoreBuilder::new(config).build_json(items);
    }
}

impl<V: Keyed, S: Sink> KeyedStore<V, S> {
    pub fn with_sink(items: Vec<V>, config: StoreConfig, sink: S) -> Result<KeyedStore<V, S>, StoreError> {
        return StoreBuilder::new(config).sink(sink).build(items);
    }

    // --- Batch edits ---

    /// Open a batch edit. Does nothing if one is already open: batches do
    /// not nest.
    pub fn begin_edit(&mut self) {
        if self.editing {
            return;
        }
        self.editing = true;
        debug!("begin edit");
        self.sink.begin_batch();
    }

    /// Close the open batch edit, if any.
    pub fn end_edit(&mut self) {
        if !self.editing {
            return;
        }
        self.editing = false;
        debug!("end edit");
        self.sink.end_batch();
    }

    /// Run `f` inside a batch edit.
    ///
    /// The batch is closed when `f` returns, whatever it returns, and also
    /// when `f` unwinds. If a batch was already open it is left open for the
    /// caller to close.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let opened = !self.editing;
        self.begin_edit();
        let mut scope = EditScope { store: self, opened };
        return f(&mut *scope.store);
    }

    // --- Fetching ---

    /// Fetch the sequence anchored at `start_index`.
    ///
    /// The counts are accepted for the list-view contract but the whole
    /// sequence is always returned.
    pub fn fetch_range(
        &self,
        start_index: usize,
        _count_before: usize,
        _count_after: usize,
    ) -> Result<Fetch<'_, V>, StoreError> {
        if start_index >= self.records.len() {
            return Err(StoreError::IndexNotFound {
                index: start_index,
                count: self.records.len(),
            });
        }
        return Ok(self.fetch_at(start_index));
    }

    /// Fetch the sequence anchored at the record for `key`.
    pub fn fetch_by_key(
        &self,
        key: &str,
        _count_before: usize,
        _count_after: usize,
    ) -> Result<Fetch<'_, V>, StoreError> {
        match self.index.get(key) {
            Some(&index) => Ok(self.fetch_at(index)),
            None => Err(StoreError::KeyNotFound { key: Key::new(key) }),
        }
    }

    fn fetch_at(&self, index: usize) -> Fetch<'_, V> {
        Fetch {
            items: &self.records,
            offset: index,
            absolute_index: index,
            total_count: self.records.len(),
        }
    }

    // --- Insertion and removal ---

    /// Append a record. With no key (or an empty one) the key is read from
    /// the payload's key field.
    pub fn insert_at_end(&mut self, key: Option<Key>, payload: V) -> Result<&Record<V>, StoreError> {
        let key = match key.filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => derive_key(&payload, &self.config.key_field, self.records.len())?,
        };
        if self.index.contains_key(&key) {
            warn!(%key, "rejected insert of duplicate key");
            return Err(StoreError::DuplicateKey { key });
        }

        let index = self.records.len();
        self.index.insert(key.clone(), index);
        self.records.push(Record { key, payload });
        self.check_invariants();

        let record = &self.records[index];
        trace!(key = %record.key, index, "inserted");
        self.sink.inserted(&record.key, index);
        return Ok(record);
    }

    /// Remove the record for `key`. Absent keys are ignored.
    pub fn remove(&mut self, key: &str) -> Option<Record<V>> {
        let index = self.index.remove(key)?;
        let record = self.records.remove(index);
        self.pending.remove(key);
        let len = self.records.len();
        self.reindex(index..len);
        self.check_invariants();

        trace!(key = %record.key, index, "removed");
        self.sink.removed(&record.key, index);
        return Some(record);
    }

    /// Discard every record and rebuild from `items` the way construction
    /// does, then tell the sink to reload once.
    ///
    /// On error the store is left as it was.
    #[instrument(skip_all, fields(count = items.len()))]
    pub fn replace_all(&mut self, items: Vec<V>) -> Result<(), StoreError> {
        let (records, index) = build_records(items, &self.config, self.binder.as_ref())?;
        self.records = records;
        self.index = index;
        self.pending.clear();
        self.check_invariants();

        debug!(count = self.records.len(), "replaced records");
        self.sink.reload();
        return Ok(());
    }

    // --- Moves ---

    /// Move the record for `key` to the front. Returns its new index, or
    /// `None` if the key is absent.
    pub fn move_to_start(&mut self, key: &str) -> Option<usize> {
        return self.relocate(key, 0, Target::Start);
    }

    /// Move the record for `key` to the back. Returns its new index, or
    /// `None` if the key is absent.
    pub fn move_to_end(&mut self, key: &str) -> Option<usize> {
        let last = self.records.len().checked_sub(1)?;
        return self.relocate(key, last, Target::End);
    }

    /// Move the record for `key` to directly follow the record for
    /// `after_key`. Returns its new index, or `None` if either key is absent.
    pub fn move_after(&mut self, key: &str, after_key: &str) -> Option<usize> {
        let current = *self.index.get(key)?;
        let after = *self.index.get(after_key)?;
        if current == after {
            return Some(current);
        }
        // Taking the record out first shifts everything behind it down one.
        let delta = if after + 1 > current { 0 } else { 1 };
        return self.relocate(key, after + delta, Target::After(after_key));
    }

    fn relocate(&mut self, key: &str, to: usize, target: Target<'_>) -> Option<usize> {
        let from = *self.index.get(key)?;
        if self.pending.remove(key) {
            self.acknowledge(from, target);
            return Some(from);
        }
        if from == to {
            return Some(to);
        }

        let record = self.records.remove(from);
        self.records.insert(to, record);
        self.reindex(from.min(to)..from.max(to) + 1);
        self.check_invariants();

        let key = &self.records[to].key;
        trace!(%key, from, to, "moved");
        self.sink.moved(key, from, to);
        return Some(to);
    }

    /// Report a move for a record the sort already put at `index`.
    ///
    /// The sink has not seen the sort, so the move is resolved against its
    /// projection of the order, relative to `target`'s key rather than to a
    /// store position.
    fn acknowledge(&mut self, index: usize, target: Target<'_>) {
        let key = &self.records[index].key;
        let (from, to) = match self.projection.as_mut() {
            Some(projection) => match projection.iter().position(|k| k == key) {
                Some(from) => {
                    let moved = projection.remove(from);
                    let to = match target {
                        Target::Start => 0,
                        Target::End => projection.len(),
                        Target::After(after) => projection
                            .iter()
                            .position(|k| k.as_str() == after)
                            .map_or(projection.len(), |at| at + 1),
                    };
                    projection.insert(to, moved);
                    (from, to)
                }
                None => (index, index),
            },
            None => (index, index),
        };
        trace!(%key, from, to, "acknowledged move");
        self.sink.moved(key, from, to);
    }

    /// Stable sort by payload, then replay the new order to the sink.
    ///
    /// Every record whose position changed gets a `move_to_start` (if it is
    /// now first) or a `move_after` its new predecessor, scanning left to
    /// right. Runs inside a batch edit unless the caller already opened one.
    /// Returns the number of moves replayed.
    #[instrument(skip_all, fields(count = self.records.len()))]
    pub fn sort<F>(&mut self, mut compare: F) -> usize
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        if self.records.len() < 2 {
            return 0;
        }

        return self.edit(|store| {
            let before: Vec<Key> = store.records.iter().map(|r| r.key.clone()).collect();
            // Ordered first, applied after: a comparator that panics leaves the
            // records untouched.
            let order = stable_order(&store.records, |a, b| compare(&a.payload, &b.payload));
            let mut taken: Vec<Option<Record<V>>> =
                std::mem::take(&mut store.records).into_iter().map(Some).collect();
            store.records = order.iter().filter_map(|&i| taken[i].take()).collect();
            let len = store.records.len();
            store.reindex(0..len);
            store.check_invariants();

            store.projection = Some(before.clone());
            let mut moves = 0;
            for i in 0..store.records.len() {
                if store.records[i].key == before[i] {
                    continue;
                }
                let key = store.records[i].key.clone();
                store.pending.insert(key.clone());
                if i == 0 {
                    store.move_to_start(&key);
                } else {
                    let previous = store.records[i - 1].key.clone();
                    store.move_after(&key, &previous);
                }
                moves += 1;
            }
            store.projection = None;
            store.pending.clear();

            debug!(moves, "sorted");
            moves
        });
    }

    // --- Internals ---

    /// Rewrite the index entries for the records in `range`.
    fn reindex(&mut self, range: Range<usize>) {
        let start = range.start;
        for (i, record) in self.records[range].iter().enumerate() {
            if let Some(slot) = self.index.get_mut(&record.key) {
                *slot = start + i;
            }
        }
    }

    // --- Invariant checking ---

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        assert_eq!(
            self.index.len(),
            self.records.len(),
            "INVARIANT VIOLATED: index has {} entries for {} records",
            self.index.len(),
            self.records.len()
        );
        for (i, record) in self.records.iter().enumerate() {
            assert_eq!(
                self.index.get(&record.key),
                Some(&i),
                "INVARIANT VIOLATED: record {:?} at {} is indexed elsewhere",
                record.key,
                i
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn check_invariants(&self) {}
}

impl<V, S> KeyedStore<V, S> {
    /// Number of records.
    pub fn len(&self) -> usize {
        return self.records.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.records.is_empty();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        return self.index.contains_key(key);
    }

    pub fn get_by_key(&self, key: &str) -> Option<&V> {
        let index = *self.index.get(key)?;
        return Some(&self.records[index].payload);
    }

    pub fn get_at_index(&self, index: usize) -> Option<&V> {
        return self.records.get(index).map(|r| &r.payload);
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        return self.index.get(key).copied();
    }

    /// Keys in view order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        return self.records.iter().map(|r| &r.key);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record<V>> {
        return self.records.iter();
    }

    pub fn records(&self) -> &[Record<V>] {
        return &self.records;
    }

    pub fn in_edit(&self) -> bool {
        return self.editing;
    }

    pub fn config(&self) -> &StoreConfig {
        return &self.config;
    }

    pub fn sink(&self) -> &S {
        return &self.sink;
    }

    pub fn sink_mut(&mut self) -> &mut S {
        return &mut self.sink;
    }

    pub fn into_sink(self) -> S {
        return self.sink;
    }
}

impl<S: Sink> KeyedStore<Value, S> {
    /// `replace_all` from a JSON value: an array of records, or `null` for
    /// none.
    pub fn replace_all_json(&mut self, items: Value) -> Result<(), StoreError> {
        let items = json_items(items)?;
        return self.replace_all(items);
    }
}

impl<V: fmt::Debug, S> fmt::Debug for KeyedStore<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("records", &self.records)
            .field("key_field", &self.config.key_field)
            .field("editing", &self.editing)
            .finish()
    }
}

impl<'a, V, S> IntoIterator for &'a KeyedStore<V, S> {
    type Item = &'a Record<V>;
    type IntoIter = std::slice::Iter<'a, Record<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Stable bottom-up merge sort of `items`, returned as a permutation of
/// indices.
///
/// Only reads `compare`, so an inconsistent comparator yields some
/// permutation rather than a panic.
fn stable_order<T>(items: &[T], mut compare: impl FnMut(&T, &T) -> Ordering) -> Vec<usize> {
    let len = items.len();
    let mut order: Vec<usize> = (0..len).collect();
    let mut merged = Vec::with_capacity(len);
    let mut width = 1;
    while width < len {
        merged.clear();
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                // Ties take the left run.
                if compare(&items[order[j]], &items[order[i]]) == Ordering::Less {
                    merged.push(order[j]);
                    j += 1;
                } else {
                    merged.push(order[i]);
                    i += 1;
                }
            }
            merged.extend_from_slice(&order[i..mid]);
            merged.extend_from_slice(&order[j..end]);
            start = end;
        }
        std::mem::swap(&mut order, &mut merged);
        width *= 2;
    }
    return order;
}

fn derive_key<V: Keyed>(payload: &V, field: &str, position: usize) -> Result<Key, StoreError> {
    match payload.key_field(field).filter(|k| !k.is_empty()) {
        Some(key) => Ok(key),
        None => {
            warn!(position, field, "item has no usable key");
            Err(StoreError::InvalidInput(format!(
                "item {} has no usable {:?} field",
                position, field
            )))
        }
    }
}

fn build_records<V: Keyed>(
    items: Vec<V>,
    config: &StoreConfig,
    binder: Option<&Binder<V>>,
) -> Result<(Vec<Record<V>>, FxHashMap<Key, usize>), StoreError> {
    let mut records = Vec::with_capacity(items.len());
    let mut index = FxHashMap::default();
    index.reserve(items.len());

    for (i, item) in items.into_iter().enumerate() {
        let key = derive_key(&item, &config.key_field, i)?;
        if index.insert(key.clone(), i).is_some() {
            warn!(%key, position = i, "duplicate key in input");
            return Err(StoreError::DuplicateKey { key });
        }
        let payload = match binder {
            Some(bind) if config.use_binding => bind(item),
            _ => item,
        };
        records.push(Record { key, payload });
    }
    return Ok((records, index));
}

fn json_items(items: Value) -> Result<Vec<Value>, StoreError> {
    match items {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(StoreError::InvalidInput(format!(
            "expected an array of records, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
