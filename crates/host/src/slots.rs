//! Generational slot storage.
//!
//! Values are addressed by a [`Handle`] instead of a raw position. Freed
//! slots are reused, but every reuse bumps the slot's generation, so a handle
//! to a removed value never resolves to whatever took its place.

use tracing::trace;

/// An opaque reference to a value in [`Slots`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// An owned collection indexed by generational handles.
#[derive(Debug)]
pub struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T> Slots<T> {
    pub fn new() -> Slots<T> {
        return Slots {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        };
    }

    pub fn len(&self) -> usize {
        return self.len;
    }

    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            trace!(index, generation = slot.generation, "reused slot");
            return Handle { index, generation: slot.generation };
        }
        assert!(self.slots.len() < u32::MAX as usize, "too many slots");
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, value: Some(value) });
        return Handle { index, generation: 0 };
    }

    fn slot(&self, handle: Handle) -> Option<&Slot<T>> {
        return self
            .slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation);
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        return self.slot(handle)?.value.as_ref();
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        return slot.value.as_mut();
    }

    pub fn contains(&self, handle: Handle) -> bool {
        return self.get(handle).is_some();
    }

    /// Remove and return the value. The handle, and every copy of it, stops
    /// resolving.
    ///
    /// A slot whose generation is exhausted is retired instead of reused.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        self.len -= 1;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(handle.index);
                trace!(index = handle.index, "freed slot");
            }
            None => trace!(index = handle.index, "retired slot"),
        }
        return Some(value);
    }

    /// Live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        return self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let value = slot.value.as_ref()?;
            return Some((Handle { index: i as u32, generation: slot.generation }, value));
        });
    }
}
