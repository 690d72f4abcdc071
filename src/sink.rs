//! Change notifications.
//!
//! A [`Sink`] observes every structural change a store makes, in the order
//! the store makes them. A list view keeps its rendered items in sync by
//! replaying these changes.

use crate::key::Key;

/// Observer of structural changes. Every method defaults to a no-op.
pub trait Sink {
    /// A batch edit was opened.
    fn begin_batch(&mut self) {}

    /// The open batch edit was closed.
    fn end_batch(&mut self) {}

    /// `key` was appended and now lives at `index`.
    fn inserted(&mut self, _key: &Key, _index: usize) {}

    /// `key` was removed from `index`.
    fn removed(&mut self, _key: &Key, _index: usize) {}

    /// `key` moved from `from` to `to`.
    ///
    /// Indices are relative to the sink's view of the list: `from` is where
    /// the record sits after every earlier notification has been applied.
    fn moved(&mut self, _key: &Key, _from: usize, _to: usize) {}

    /// The whole data set was replaced.
    fn reload(&mut self) {}
}

/// The null sink.
impl Sink for () {}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn begin_batch(&mut self) {
        (**self).begin_batch();
    }

    fn end_batch(&mut self) {
        (**self).end_batch();
    }

    fn inserted(&mut self, key: &Key, index: usize) {
        (**self).inserted(key, index);
    }

    fn removed(&mut self, key: &Key, index: usize) {
        (**self).removed(key, index);
    }

    fn moved(&mut self, key: &Key, from: usize, to: usize) {
        (**self).moved(key, from, to);
    }

    fn reload(&mut self) {
        (**self).reload();
    }
}

/// One recorded sink call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    BeginBatch,
    EndBatch,
    Inserted { key: Key, index: usize },
    Removed { key: Key, index: usize },
    Moved { key: Key, from: usize, to: usize },
    Reload,
}

/// A sink that records every notification in call order.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    pub events: Vec<Notification>,
}

impl Recorder {
    pub fn new() -> Recorder {
        return Recorder::default();
    }

    /// Take the recorded events, leaving the recorder empty.
    pub fn drain(&mut self) -> Vec<Notification> {
        return std::mem::take(&mut self.events);
    }

    /// Number of `Moved` notifications recorded.
    pub fn move_count(&self) -> usize {
        return self
            .events
            .iter()
            .filter(|e| matches!(e, Notification::Moved { .. }))
            .count();
    }

    /// Apply the recorded list changes to `keys`, a copy of the list as it
    /// was before the first recorded event.
    ///
    /// Returns `None` if an event does not fit the projection (an index out
    /// of range, or a key that is not where the event says it is).
    pub fn replay(&self, keys: &mut Vec<Key>) -> Option<()> {
        for event in &self.events {
            match event {
                Notification::Inserted { key, index } => {
                    if *index > keys.len() {
                        return None;
                    }
                    keys.insert(*index, key.clone());
                }
                Notification::Removed { key, index } => {
                    if keys.get(*index) != Some(key) {
                        return None;
                    }
                    keys.remove(*index);
                }
                Notification::Moved { key, from, to } => {
                    if keys.get(*from) != Some(key) || *to >= keys.len() {
                        return None;
                    }
                    let moved = keys.remove(*from);
                    keys.insert(*to, moved);
                }
                Notification::Reload => return None,
                Notification::BeginBatch | Notification::EndBatch => {}
            }
        }
        return Some(());
    }
}

impl Sink for Recorder {
    fn begin_batch(&mut self) {
        self.events.push(Notification::BeginBatch);
    }

    fn end_batch(&mut self) {
        self.events.push(Notification::EndBatch);
    }

    fn inserted(&mut self, key: &Key, index: usize) {
        self.events.push(Notification::Inserted { key: key.clone(), index });
    }

    fn removed(&mut self, key: &Key, index: usize) {
        self.events.push(Notification::Removed { key: key.clone(), index });
    }

    fn moved(&mut self, key: &Key, from: usize, to: usize) {
        self.events.push(Notification::Moved { key: key.clone(), from, to });
    }

    fn reload(&mut self) {
        self.events.push(Notification::Reload);
    }
}
