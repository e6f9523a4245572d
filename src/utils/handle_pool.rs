use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

/// `HandlePool` hands out generational handles over a dense index space.
/// Freed indices are recycled lowest-first, so a pool that shrinks and grows
/// again keeps its live handles packed at the front.
pub struct HandlePool<H: HandleLike> {
    versions: Vec<HandleIndex>,
    frees: BinaryHeap<Reverse<HandleIndex>>,
    _marker: PhantomData<H>,
}

impl<H: HandleLike> Default for HandlePool<H> {
    fn default() -> Self {
        HandlePool::new()
    }
}

impl<H: HandleLike> HandlePool<H> {
    pub fn new() -> Self {
        HandlePool {
            versions: Vec::new(),
            frees: BinaryHeap::new(),
            _marker: PhantomData,
        }
    }

    /// Issues a handle, reusing the lowest free index if there is one.
    pub fn create(&mut self) -> H {
        if let Some(Reverse(index)) = self.frees.pop() {
            let version = &mut self.versions[index as usize];
            *version += 1;
            H::new(index, *version)
        } else {
            self.versions.push(1);
            H::new(self.versions.len() as HandleIndex - 1, 1)
        }
    }

    /// Returns true if `handle` was issued by this pool and not freed since.
    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        let index = handle.index() as usize;
        self.is_alive_at(index) && self.versions[index] == handle.version()
    }

    #[inline]
    fn is_alive_at(&self, index: usize) -> bool {
        index < self.versions.len() && (self.versions[index] & 0x1) == 1
    }

    /// Recycles the index of `handle`. Returns false if it was already dead.
    pub fn free(&mut self, handle: H) -> bool {
        if !self.contains(handle) {
            return false;
        }

        self.versions[handle.index() as usize] += 1;
        self.frees.push(Reverse(handle.index()));
        true
    }

    /// Number of live handles.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
