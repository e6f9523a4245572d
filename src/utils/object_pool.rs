use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

struct Entry<T> {
    version: HandleIndex,
    value: Option<T>,
}

/// Values named by generational handles.
///
/// Each entry keeps the version of its slot next to the value, so a lookup
/// is a single bounds check plus a version compare. Like `HandlePool`, freed
/// slots are reused lowest index first.
pub struct ObjectPool<H: HandleLike, T> {
    entries: Vec<Entry<T>>,
    frees: BinaryHeap<Reverse<HandleIndex>>,
    _marker: PhantomData<H>,
}

impl<H: HandleLike, T> Default for ObjectPool<H, T> {
    fn default() -> Self {
        ObjectPool::new()
    }
}

impl<H: HandleLike, T> ObjectPool<H, T> {
    pub fn new() -> Self {
        ObjectPool::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ObjectPool {
            entries: Vec::with_capacity(capacity),
            frees: BinaryHeap::new(),
            _marker: PhantomData,
        }
    }

    /// Stores `value` under a fresh handle.
    pub fn create(&mut self, value: T) -> H {
        match self.frees.pop() {
            Some(Reverse(index)) => {
                let entry = &mut self.entries[index as usize];
                entry.version += 1;
                entry.value = Some(value);
                H::new(index, entry.version)
            }
            None => {
                self.entries.push(Entry {
                    version: 1,
                    value: Some(value),
                });

                H::new(self.entries.len() as HandleIndex - 1, 1)
            }
        }
    }

    #[inline]
    fn entry(&self, handle: H) -> Option<&Entry<T>> {
        self.entries
            .get(handle.index() as usize)
            .filter(|v| v.version == handle.version() && v.value.is_some())
    }

    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        self.entry(handle).is_some()
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        self.entry(handle).and_then(|v| v.value.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        match self.entries.get_mut(handle.index() as usize) {
            Some(entry) if entry.version == handle.version() => entry.value.as_mut(),
            _ => None,
        }
    }

    /// Takes the value out and retires the handle.
    pub fn free(&mut self, handle: H) -> Option<T> {
        let entry = match self.entries.get_mut(handle.index() as usize) {
            Some(entry) if entry.version == handle.version() => entry,
            _ => return None,
        };

        let value = entry.value.take()?;
        entry.version += 1;
        self.frees.push(Reverse(handle.index()));
        Some(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live `(handle, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry
                .value
                .as_ref()
                .map(|v| (H::new(index as HandleIndex, entry.version), v))
        })
    }

    /// Live handles in index order.
    pub fn keys(&self) -> impl Iterator<Item = H> + '_ {
        self.iter().map(|(h, _)| h)
    }

    #[inline]
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|v| v.value.as_ref())
    }

    #[inline]
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().filter_map(|v| v.value.as_mut())
    }
}
