//! Rings of slots sharing one asset.
//!
//! Every slot is a member of a singly linked ring through `link_next`; an
//! unlinked slot is a ring of one. `link` splices a new slot in front of its
//! source, so walking from any member visits the whole ring and comes back.
//! Strong members co-own the asset. Weak members only observe it: once the
//! last strong member is freed the asset is destroyed and the weak survivors
//! go stale.

use smallvec::SmallVec;

use crate::errors::*;
use crate::utils::prelude::ObjectPool;

use super::assets::destroy_asset;
use super::load::LoadHandle;
use super::slot::{ResourceId, Slot, SlotKind, SlotRef};
use super::system::ResourceSystem;
use super::table::{Manager, ManagerHandle};

/// Upper bound of members visited by a single ring walk.
pub const MAX_RING_WALK: usize = 10_000;

pub(crate) type Managers = ObjectPool<ManagerHandle, Manager>;
pub(crate) type Members = SmallVec<[SlotRef; 8]>;

#[inline]
pub(crate) fn slot(managers: &Managers, r: SlotRef) -> Option<&Slot> {
    managers
        .get(r.manager)
        .and_then(|v| v.at(r.index))
        .filter(|v| v.is_used())
}

#[inline]
pub(crate) fn slot_mut(managers: &mut Managers, r: SlotRef) -> Option<&mut Slot> {
    managers
        .get_mut(r.manager)
        .and_then(|v| v.at_mut(r.index))
        .filter(|v| v.is_used())
}

/// The members of a ring, in link order starting with the slot the walk
/// started from.
pub(crate) struct Walk {
    pub members: Members,
    /// False if the ring had to be cut to close it.
    pub intact: bool,
}

/// Walks the ring of `start`.
///
/// A ring that does not come back within `MAX_RING_WALK` steps, or that runs
/// into a slot that is no longer in use, is cut after the last member
/// reached so that it closes on `start` again.
pub(crate) fn walk(managers: &mut Managers, start: SlotRef) -> Walk {
    let mut members = Members::new();
    members.push(start);

    let mut cursor = start;
    loop {
        let next = match slot(managers, cursor) {
            Some(v) => v.link_next,
            None => break,
        };

        if next == start {
            return Walk {
                members,
                intact: true,
            };
        }

        if members.len() >= MAX_RING_WALK {
            error!(
                "[Link] ring through {} exceeds {} members, cutting it.",
                start, MAX_RING_WALK
            );
            break;
        }

        if slot(managers, next).is_none() {
            error!(
                "[Link] ring through {} points to dead slot {}, cutting it.",
                start, next
            );
            break;
        }

        members.push(next);
        cursor = next;
    }

    if let Some(v) = slot_mut(managers, cursor) {
        v.link_next = start;
    }

    Walk {
        members,
        intact: false,
    }
}

impl ResourceSystem {
    /// Adds a strong link to the resource `src` of `src_mgr` in manager
    /// `dst`. The new slot shares the payload, and the load if there is one
    /// in flight, and keeps the payload alive on its own.
    pub fn link(
        &mut self,
        dst: ManagerHandle,
        src_mgr: ManagerHandle,
        src: ResourceId,
    ) -> Result<ResourceId> {
        self.link_with(dst, src_mgr, src, false)
    }

    /// Like `link`, but the new slot does not keep the payload alive. It
    /// goes stale once every strong member of its ring is freed.
    pub fn link_weak(
        &mut self,
        dst: ManagerHandle,
        src_mgr: ManagerHandle,
        src: ResourceId,
    ) -> Result<ResourceId> {
        self.link_with(dst, src_mgr, src, true)
    }

    fn link_with(
        &mut self,
        dst: ManagerHandle,
        src_mgr: ManagerHandle,
        src: ResourceId,
        weak: bool,
    ) -> Result<ResourceId> {
        let id = self.manager_mut(dst)?.register(dst, SlotKind::Unknown)?;
        let this = SlotRef::new(dst, id.index() as u32);

        match self.splice(this, SlotRef::new(src_mgr, src.index() as u32), weak) {
            Ok(()) => {
                trace!("[Link] {} -> {}#{} (weak: {}).", this, src_mgr, src, weak);
                Ok(id)
            }
            Err(err) => {
                warn!("[Link] failed to link {}#{}: {}", src_mgr, src, err);
                if let Some(manager) = self.managers.get_mut(dst) {
                    manager.release(dst, this.index);
                }

                Err(err)
            }
        }
    }

    fn splice(&mut self, this: SlotRef, src: SlotRef, weak: bool) -> Result<()> {
        if !self.managers.contains(src.manager) {
            return Err(Error::InvalidManager(src.manager));
        }

        let (kind, asset, load) = match slot(&self.managers, src) {
            Some(v) if v.stale => return Err(Error::StaleLink(src.index + 1)),
            Some(v) => (v.kind, v.asset, v.load),
            None => return Err(Error::InvalidResource(src.index + 1)),
        };

        let ring = walk(&mut self.managers, src);
        if !ring.intact {
            return Err(Error::RingOverflow(src.index + 1, MAX_RING_WALK));
        }

        let prev = ring.members[ring.members.len() - 1];
        if let Some(v) = slot_mut(&mut self.managers, this) {
            v.kind = kind;
            v.asset = asset;
            v.load = load;
            v.weak = weak;
            v.link_next = src;
        }

        if let Some(v) = slot_mut(&mut self.managers, prev) {
            v.link_next = this;
        }

        Ok(())
    }

    /// Returns true if `id` is a weak link whose payload was destroyed.
    pub fn is_stale(&self, mgr: ManagerHandle, id: ResourceId) -> bool {
        self.slot(mgr, id).map(|v| v.stale).unwrap_or(false)
    }

    /// Frees the resource `id`. The payload is destroyed if no other strong
    /// member of its ring remains, and an in-flight load is aborted with it.
    pub fn free(&mut self, mgr: ManagerHandle, id: ResourceId) -> Result<()> {
        let manager = self.manager(mgr)?;
        if manager.get(id).is_none() {
            warn!("[Link] free of unused resource {}#{}.", mgr, id);
            return Err(Error::InvalidResource(id.get()));
        }

        self.free_slot(SlotRef::new(mgr, id.index() as u32));
        Ok(())
    }

    /// Frees every resource of `mgr`.
    ///
    /// Loads that will die with this manager are told to abort up front, so
    /// no read started by one of them holds up freeing the others.
    pub fn free_all(&mut self, mgr: ManagerHandle) -> Result<()> {
        let ids: Vec<ResourceId> = self.manager(mgr)?.ids().collect();

        let mut dying: SmallVec<[LoadHandle; 8]> = SmallVec::new();
        for id in &ids {
            let this = SlotRef::new(mgr, id.index() as u32);
            let load = match slot(&self.managers, this).and_then(|v| v.load) {
                Some(load) if !dying.contains(&load) => load,
                _ => continue,
            };

            let ring = walk(&mut self.managers, this);
            let kept = ring.members.iter().any(|&m| {
                m.manager != mgr && slot(&self.managers, m).map_or(false, |v| !v.weak)
            });

            if !kept {
                dying.push(load);
            }
        }

        for &load in &dying {
            self.pipeline.signal_abort(load);
        }

        for id in ids {
            self.free_slot(SlotRef::new(mgr, id.index() as u32));
        }

        debug!("[Link] freed every resource of {}.", mgr);
        Ok(())
    }

    pub(crate) fn free_slot(&mut self, this: SlotRef) {
        let (asset, load) = match slot(&self.managers, this) {
            Some(v) => (v.asset, v.load),
            None => return,
        };

        let ring = walk(&mut self.managers, this);
        let others = &ring.members[1..];

        if let (Some(&first), Some(&last)) = (others.first(), others.last()) {
            if let Some(v) = slot_mut(&mut self.managers, last) {
                v.link_next = first;
            }
        }

        if let Some(manager) = self.managers.get_mut(this.manager) {
            manager.release(this.manager, this.index);
        }

        let survivor = others
            .iter()
            .cloned()
            .find(|&m| slot(&self.managers, m).map_or(false, |v| !v.weak));

        if let Some(survivor) = survivor {
            if let Some(load) = load {
                let heir = others
                    .iter()
                    .cloned()
                    .find(|&m| slot(&self.managers, m).map_or(false, |v| v.load == Some(load)))
                    .unwrap_or(survivor);

                self.pipeline.rehome(load, this, heir);
            }

            trace!("[Link] freed {}, payload kept by {}.", this, survivor);
            return;
        }

        if let Some(load) = load {
            self.pipeline.discard(load);
        }

        if let Some(asset) = asset.and_then(|v| self.assets.free(v)) {
            destroy_asset(&mut *self.factory, asset);
        }

        for &m in others {
            if let Some(v) = slot_mut(&mut self.managers, m) {
                v.asset = None;
                v.load = None;
                v.stale = true;
                v.link_next = m;
            }
        }

        trace!(
            "[Link] freed {} with its payload, {} links went stale.",
            this,
            others.len()
        );
    }
}
