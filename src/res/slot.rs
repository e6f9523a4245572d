//! Slot records of a manager's resource table.

use std::fmt;
use std::num::NonZeroU32;

use super::assets::AssetHandle;
use super::load::LoadHandle;
use super::table::ManagerHandle;

/// Generation stamp of a manager. Zero is never handed out.
pub type Mark = u32;

/// Compares two marks with wraparound. Negative if `a` is older than `b`,
/// zero if equal, positive if newer.
#[inline]
pub fn compare_marks(a: Mark, b: Mark) -> i32 {
    a.wrapping_sub(b) as i32
}

/// What a slot currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Unused,
    /// Allocated, but the kind was not copied in yet.
    Unknown,
    Data,
    Texture,
    Font,
    Sound,
    File,
}

impl Default for SlotKind {
    fn default() -> Self {
        SlotKind::Unused
    }
}

/// Client-visible name of a slot within its manager.
///
/// An id is the slot index plus one, so id `0` never names anything and
/// can not be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(NonZeroU32);

impl ResourceId {
    /// Wraps a raw id. Returns `None` for `0`.
    #[inline]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(ResourceId)
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        if index >= u32::max_value() as usize {
            return None;
        }

        ResourceId::new(index as u32 + 1)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a slot in some manager. Rings are chained through these, so
/// a link stays valid while the target table grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub manager: ManagerHandle,
    pub index: u32,
}

impl SlotRef {
    #[inline]
    pub fn new(manager: ManagerHandle, index: u32) -> Self {
        SlotRef { manager, index }
    }

    #[inline]
    pub fn id(self) -> Option<ResourceId> {
        ResourceId::from_index(self.index as usize)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.manager, self.index + 1)
    }
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub(crate) kind: SlotKind,
    pub(crate) asset: Option<AssetHandle>,
    pub(crate) link_next: SlotRef,
    pub(crate) mark: Mark,
    pub(crate) weak: bool,
    pub(crate) stale: bool,
    pub(crate) load: Option<LoadHandle>,
}

impl Slot {
    /// An unused slot forming a ring of its own.
    pub(crate) fn unused(this: SlotRef) -> Self {
        Slot {
            kind: SlotKind::Unused,
            asset: None,
            link_next: this,
            mark: 0,
            weak: false,
            stale: false,
            load: None,
        }
    }

    /// Puts the slot back into its unused state, detached from any ring.
    pub(crate) fn reset(&mut self, this: SlotRef) {
        *self = Slot::unused(this);
    }

    #[inline]
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.kind != SlotKind::Unused
    }

    #[inline]
    pub fn mark(&self) -> Mark {
        self.mark
    }

    #[inline]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// The next member of the ring this slot belongs to.
    #[inline]
    pub fn link_next(&self) -> SlotRef {
        self.link_next
    }

    /// The in-flight load this slot observes, shared by its whole ring.
    #[inline]
    pub fn load(&self) -> Option<LoadHandle> {
        self.load
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    /// Identity of the payload, shared by every member of the ring.
    #[inline]
    pub fn asset(&self) -> Option<AssetHandle> {
        self.asset
    }
}
