use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::errors::*;

use super::slot::{Mark, ResourceId, Slot, SlotKind, SlotRef};

impl_handle!(ManagerHandle);

/// The resource table of one manager.
///
/// Slots are addressed by index and never move relative to each other: the
/// table only grows by appending, and unused slots are recycled lowest index
/// first. Rings refer to slots by `(manager, index)`, so growing the backing
/// storage never invalidates a link.
pub struct Manager {
    slots: Vec<Slot>,
    frees: BinaryHeap<Reverse<u32>>,
    capacity: usize,
    grow_increment: usize,
    mark: Mark,
    initialized: bool,
}

impl Manager {
    /// Creates a manager with storage for `capacity` slots reserved up front.
    pub fn new(capacity: usize, grow_increment: usize) -> Result<Self> {
        let mut manager = Manager::declared(capacity, grow_increment);
        manager.ensure_init()?;
        Ok(manager)
    }

    /// Creates a manager whose storage is reserved by the first operation
    /// that adds a slot.
    pub fn declared(capacity: usize, grow_increment: usize) -> Self {
        Manager {
            slots: Vec::new(),
            frees: BinaryHeap::new(),
            capacity,
            grow_increment: grow_increment.max(1),
            mark: 1,
            initialized: false,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_init(&mut self) -> Result<()> {
        if !self.initialized {
            self.slots.try_reserve_exact(self.capacity)?;
            self.initialized = true;
            trace!("[Manager] initialized with {} slots.", self.capacity);
        }

        Ok(())
    }

    /// Every slot, used or not. Empty until the manager is initialized.
    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of slots the table can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.initialized {
            self.slots.capacity()
        } else {
            self.capacity
        }
    }

    /// Number of used slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn at(&self, index: u32) -> Option<&Slot> {
        self.slots.get(index as usize)
    }

    #[inline]
    pub fn at_mut(&mut self, index: u32) -> Option<&mut Slot> {
        self.slots.get_mut(index as usize)
    }

    /// The used slot named `id`.
    #[inline]
    pub fn get(&self, id: ResourceId) -> Option<&Slot> {
        self.slots.get(id.index()).filter(|v| v.is_used())
    }

    #[inline]
    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index()).filter(|v| v.is_used())
    }

    /// Ids of every used slot, ascending.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = ResourceId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_used())
            .filter_map(|(i, _)| ResourceId::from_index(i))
    }

    /// Allocates the lowest unused slot, growing the table if every slot is
    /// taken. On failure the table is left as it was.
    pub fn register(&mut self, this: ManagerHandle, kind: SlotKind) -> Result<ResourceId> {
        self.ensure_init()?;

        let index = match self.frees.peek() {
            Some(&Reverse(index)) => index as usize,
            None => {
                let index = self.slots.len();
                if ResourceId::from_index(index).is_none() {
                    return Err(Error::OutOfMemory);
                }

                if index == self.slots.capacity() {
                    self.slots.try_reserve_exact(self.grow_increment)?;
                    debug!(
                        "[Manager] {} grows to {} slots.",
                        this,
                        self.slots.capacity()
                    );
                }

                self.slots.push(Slot::unused(SlotRef::new(this, index as u32)));
                self.frees.push(Reverse(index as u32));
                index
            }
        };

        self.frees.pop();

        let slot = &mut self.slots[index];
        slot.reset(SlotRef::new(this, index as u32));
        slot.kind = kind;
        slot.mark = self.mark;

        ResourceId::from_index(index).ok_or(Error::OutOfMemory)
    }

    /// Returns a slot to the unused state. The caller is responsible for
    /// having unlinked it from its ring.
    pub fn release(&mut self, this: ManagerHandle, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if slot.is_used() {
                slot.reset(SlotRef::new(this, index));
                self.frees.push(Reverse(index));
            }
        }
    }

    /// The mark new slots are stamped with.
    #[inline]
    pub fn current_mark(&self) -> Mark {
        self.mark
    }

    /// Starts a new generation and returns it. Every slot that exists now
    /// compares older than the returned mark.
    pub fn mark(&mut self) -> Mark {
        self.mark = self.mark.wrapping_add(1);
        if self.mark == 0 {
            self.mark = 1;
        }

        self.mark
    }
}
