//! The asynchronous load pipeline.
//!
//! Every in-flight load is a `PendingLoad` named by a `LoadHandle`, which is
//! stored in each slot of the ring observing the load. A load moves through
//! these states:
//!
//! | State       | Meaning                                                   |
//! |-------------|-----------------------------------------------------------|
//! | `AwaitSlot` | every async read slot was busy, the read is issued later  |
//! | `Reading`   | one async read covers all stored bytes                    |
//! | `Streaming` | a background job reads and decompresses in chunks         |
//! | `Ready`     | the bytes are in (or the load failed), waiting to finalize |
//!
//! Finalization always happens on the client thread, from `sync` or `wait`.
//! It turns the bytes into an asset, installs it in every slot observing the
//! load, and drops the `PendingLoad`.

use std::mem;
use std::sync::Arc;
use std::thread;

use crate::errors::*;
use crate::sched::prelude::WorkId;
use crate::utils::prelude::ObjectPool;

use super::assets::{destroy_asset, Asset, DataBlob, MemFlags};
use super::file::FileHandle;
use super::link::{slot_mut, walk};
use super::package::Package;
use super::params::WaitOrder;
use super::request::{AsyncIo, ReadId, SubmitError};
use super::slot::{compare_marks, Mark, SlotKind, SlotRef};
use super::stream::{Background, StreamJob, StreamSource};
use super::system::ResourceSystem;
use super::table::ManagerHandle;
use super::vfs::Resolved;

impl_handle!(LoadHandle);

/// How the loaded bytes are turned into an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalizer {
    Data { align: usize, flags: MemFlags },
    Texture { mipmaps: bool },
    BitmapFont,
    FreetypeFont,
    Sound,
}

impl Finalizer {
    pub fn kind(self) -> SlotKind {
        match self {
            Finalizer::Data { .. } => SlotKind::Data,
            Finalizer::Texture { .. } => SlotKind::Texture,
            Finalizer::BitmapFont | Finalizer::FreetypeFont => SlotKind::Font,
            Finalizer::Sound => SlotKind::Sound,
        }
    }
}

pub(crate) enum LoadState {
    AwaitSlot,
    Reading { id: ReadId, expected: usize },
    Streaming { work: WorkId, job: Arc<StreamJob> },
    Ready,
}

pub(crate) struct PendingLoad {
    name: String,
    origin: SlotRef,
    finalizer: Finalizer,
    file: FileHandle,
    offset: u64,
    uncompressed_len: usize,
    package: Option<Arc<dyn Package>>,
    /// The buffer holds deflated bytes to be decoded at finalization.
    compressed: bool,
    buffer: Vec<u8>,
    state: LoadState,
    read_failed: bool,
    decomp_failed: bool,
}

pub(crate) struct Pipeline {
    loads: ObjectPool<LoadHandle, PendingLoad>,
    io: Arc<dyn AsyncIo>,
    background: Option<Background>,
    block_loads: bool,
}

impl Pipeline {
    pub fn new(io: Arc<dyn AsyncIo>) -> Self {
        Pipeline {
            loads: ObjectPool::new(),
            io,
            background: None,
            block_loads: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.loads.len()
    }

    #[inline]
    pub fn contains(&self, load: LoadHandle) -> bool {
        self.loads.contains(load)
    }

    #[inline]
    pub fn io_capacity(&self) -> usize {
        self.io.capacity()
    }

    #[inline]
    pub fn set_block_loads(&mut self, block: bool) {
        self.block_loads = block;
    }

    /// Replaces the background worker pool. Streaming loads of the old pool
    /// are collected first.
    pub fn set_background(&mut self, background: Option<Background>) {
        let streaming: Vec<LoadHandle> = self
            .loads
            .iter()
            .filter(|(_, v)| match v.state {
                LoadState::Streaming { .. } => true,
                _ => false,
            })
            .map(|(h, _)| h)
            .collect();

        for load in streaming {
            self.complete(load);
        }

        self.background = background;
    }

    /// Starts loading the bytes `resolved` points to.
    pub fn start(
        &mut self,
        name: &str,
        origin: SlotRef,
        finalizer: Finalizer,
        resolved: Resolved,
    ) -> Result<LoadHandle> {
        let stored_len = to_usize(resolved.stored_len)?;
        let uncompressed_len = to_usize(resolved.uncompressed_len)?;

        let mut load = PendingLoad {
            name: name.to_owned(),
            origin,
            finalizer,
            file: resolved.file,
            offset: resolved.offset,
            uncompressed_len,
            package: resolved.package,
            compressed: false,
            buffer: Vec::new(),
            state: LoadState::AwaitSlot,
            read_failed: false,
            decomp_failed: false,
        };

        if resolved.compressed {
            match self.spawn_stream(&load, resolved.stored_len) {
                Some(Ok((work, job))) => {
                    trace!("[Load] {:?} streams in the background.", name);
                    load.state = LoadState::Streaming { work, job };
                    return Ok(self.loads.create(load));
                }
                Some(Err(err)) => {
                    debug!("[Load] {:?} falls back to foreground: {}", name, err);
                }
                None => {}
            }

            load.compressed = true;
        }

        load.buffer = alloc_buffer(stored_len)?;
        if stored_len == 0 {
            load.state = LoadState::Ready;
        } else {
            issue(&*self.io, &mut load);
        }

        Ok(self.loads.create(load))
    }

    fn spawn_stream(
        &self,
        load: &PendingLoad,
        stored_len: u64,
    ) -> Option<Result<(WorkId, Arc<StreamJob>)>> {
        let background = self.background.as_ref()?;
        let package = load.package.as_ref()?;
        if stored_len < background.threshold {
            return None;
        }

        let decoder = match package.decompress_init() {
            Some(decoder) => decoder,
            None => return Some(Err(Error::Decompression("no streaming decoder".into()))),
        };

        let source = StreamSource {
            file: load.file.clone(),
            offset: load.offset,
            stored_len,
            uncompressed_len: load.uncompressed_len,
        };

        Some(background.spawn(self.io.clone(), source, decoder))
    }

    /// Drives the load without blocking. Returns true once it is ready to be
    /// finalized (or gone).
    pub fn advance(&mut self, handle: LoadHandle) -> bool {
        let io = &*self.io;
        let background = self.background.as_ref();
        let load = match self.loads.get_mut(handle) {
            Some(v) => v,
            None => return true,
        };

        match mem::replace(&mut load.state, LoadState::Ready) {
            LoadState::AwaitSlot => issue(io, load),
            LoadState::Reading { id, expected } => {
                if io.poll(id) {
                    collect_read(io, load, id, expected);
                } else {
                    load.state = LoadState::Reading { id, expected };
                }
            }
            LoadState::Streaming { work, job } => match background {
                Some(bg) if !bg.poll(work) => load.state = LoadState::Streaming { work, job },
                _ => collect_stream(background, load, work, &job),
            },
            LoadState::Ready => {}
        }

        match load.state {
            LoadState::Ready => true,
            _ => false,
        }
    }

    /// Like `advance`, but reports "not done" while loads are blocked.
    pub fn poll(&mut self, handle: LoadHandle) -> bool {
        if self.block_loads {
            return false;
        }

        self.advance(handle)
    }

    /// Advances every load in `AwaitSlot`.
    pub fn kick(&mut self) {
        let waiting: Vec<LoadHandle> = self
            .loads
            .iter()
            .filter(|(_, v)| match v.state {
                LoadState::AwaitSlot => true,
                _ => false,
            })
            .map(|(h, _)| h)
            .collect();

        for load in waiting {
            self.advance(load);
        }
    }

    /// Advances every load but `except`.
    pub fn sweep(&mut self, except: Option<LoadHandle>) {
        let loads: Vec<LoadHandle> = self.loads.keys().filter(|&h| Some(h) != except).collect();
        for load in loads {
            self.advance(load);
        }
    }

    /// Blocks until the load is ready to be finalized.
    pub fn complete(&mut self, handle: LoadHandle) {
        loop {
            let load = match self.loads.get_mut(handle) {
                Some(v) => v,
                None => return,
            };

            match mem::replace(&mut load.state, LoadState::Ready) {
                LoadState::Ready => return,
                LoadState::Reading { id, expected } => {
                    collect_read(&*self.io, load, id, expected);
                    return;
                }
                LoadState::AwaitSlot => {
                    issue(&*self.io, load);
                    let stuck = matches!(load.state, LoadState::AwaitSlot);
                    if stuck {
                        // The read slots are held by finished reads nobody
                        // collected yet.
                        self.sweep(Some(handle));
                        thread::yield_now();
                    }
                }
                LoadState::Streaming { work, job } => {
                    let done = self.background.as_ref().map_or(true, |bg| bg.poll(work));
                    if done {
                        collect_stream(self.background.as_ref(), load, work, &job);
                        return;
                    }

                    load.state = LoadState::Streaming { work, job };
                    self.sweep(Some(handle));
                    thread::yield_now();
                }
            }
        }
    }

    /// Asks the load to stop without waiting for it.
    pub fn signal_abort(&self, handle: LoadHandle) {
        if let Some(load) = self.loads.get(handle) {
            match load.state {
                LoadState::Reading { id, .. } => self.io.abort(id),
                LoadState::Streaming { ref job, .. } => job.abort(),
                _ => {}
            }
        }
    }

    /// Stops the load and drops it. Blocks until its read or streaming job
    /// has returned.
    pub fn discard(&mut self, handle: LoadHandle) {
        self.signal_abort(handle);

        if let Some(load) = self.loads.free(handle) {
            match load.state {
                LoadState::Reading { id, .. } => {
                    let _ = self.io.wait(id);
                }
                LoadState::Streaming { work, .. } => {
                    if let Some(bg) = self.background.as_ref() {
                        bg.wait(work);
                    }
                }
                _ => {}
            }

            trace!("[Load] {:?} aborted.", load.name);
        }
    }

    /// Moves the load's origin off a slot that is being freed.
    pub fn rehome(&mut self, handle: LoadHandle, from: SlotRef, to: SlotRef) {
        if let Some(load) = self.loads.get_mut(handle) {
            if load.origin == from {
                load.origin = to;
            }
        }
    }

    #[inline]
    pub fn take(&mut self, handle: LoadHandle) -> Option<PendingLoad> {
        self.loads.free(handle)
    }
}

fn issue(io: &dyn AsyncIo, load: &mut PendingLoad) {
    let buf = mem::replace(&mut load.buffer, Vec::new());
    let expected = buf.len();

    match io.read_async(&load.file, load.offset, buf) {
        Ok(id) => {
            trace!("[Load] {:?} reads {} bytes.", load.name, expected);
            load.state = LoadState::Reading { id, expected };
        }
        Err(SubmitError::SlotsFull(buf)) | Err(SubmitError::Transient(buf)) => {
            load.buffer = buf;
            load.state = LoadState::AwaitSlot;
        }
        Err(SubmitError::Failed(err)) => {
            warn!("[Load] can not read {:?}: {}", load.name, err);
            load.read_failed = true;
            load.state = LoadState::Ready;
        }
    }
}

fn collect_read(io: &dyn AsyncIo, load: &mut PendingLoad, id: ReadId, expected: usize) {
    let (buf, rsp) = io.wait(id);
    match rsp {
        Ok(n) if n == expected => load.buffer = buf,
        Ok(n) => {
            warn!(
                "[Load] short read of {:?}: {} of {} bytes.",
                load.name, n, expected
            );
            load.read_failed = true;
        }
        Err(err) => {
            warn!("[Load] read of {:?} failed: {}", load.name, err);
            load.read_failed = true;
        }
    }

    load.state = LoadState::Ready;
}

fn collect_stream(
    background: Option<&Background>,
    load: &mut PendingLoad,
    work: WorkId,
    job: &StreamJob,
) {
    if let Some(bg) = background {
        bg.wait(work);
    }

    match job.take_output() {
        Some(bytes) => load.buffer = bytes,
        None => {
            warn!("[Load] background decompression of {:?} failed.", load.name);
            load.decomp_failed = true;
        }
    }

    load.state = LoadState::Ready;
}

pub(crate) fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

fn to_usize(v: u64) -> Result<usize> {
    if v > usize::max_value() as u64 {
        return Err(Error::OutOfMemory);
    }

    Ok(v as usize)
}

impl ResourceSystem {
    /// Advances every load of `mgr` that started before `mark` and
    /// finalizes those whose bytes are in. Never blocks. Returns true if
    /// none of them is pending anymore.
    pub fn sync(&mut self, mgr: ManagerHandle, mark: Mark) -> Result<bool> {
        check_mark(mark)?;
        self.manager(mgr)?;

        for _ in 0..2 {
            for load in self.pending_loads(mgr, mark) {
                if self.pipeline.poll(load) {
                    self.finalize(load);
                }
            }
        }

        self.forget_dead_loads(mgr);
        Ok(self.pending_loads(mgr, mark).is_empty())
    }

    /// Blocks until every load of `mgr` that started before `mark` is
    /// finalized.
    pub fn wait(&mut self, mgr: ManagerHandle, mark: Mark) -> Result<()> {
        check_mark(mark)?;
        self.manager(mgr)?;

        let order = self.params.wait_order;
        let mut loads = self.pending_loads(mgr, mark);
        if order == WaitOrder::Reverse {
            loads.reverse();
        }

        let sweep = (self.pipeline.io_capacity() / 2).max(1);
        let mut completions = 0;
        for load in loads {
            if !self.pipeline.contains(load) {
                continue;
            }

            self.pipeline.complete(load);
            self.finalize(load);

            if order == WaitOrder::Forward {
                completions += 1;
                self.pipeline.kick();
                if completions % sweep == 0 {
                    self.pipeline.sweep(None);
                }
            }
        }

        self.forget_dead_loads(mgr);
        Ok(())
    }

    /// Loads observed by slots of `mgr` older than `mark`, in slot order.
    fn pending_loads(&self, mgr: ManagerHandle, mark: Mark) -> Vec<LoadHandle> {
        let mut loads = Vec::new();
        if let Some(manager) = self.managers.get(mgr) {
            for slot in manager.slots() {
                if let Some(load) = slot.load {
                    if compare_marks(slot.mark, mark) < 0 && !loads.contains(&load) {
                        loads.push(load);
                    }
                }
            }
        }

        loads
    }

    /// Clears load handles left behind in slots a ring walk could not
    /// reach.
    fn forget_dead_loads(&mut self, mgr: ManagerHandle) {
        let pipeline = &self.pipeline;
        if let Some(manager) = self.managers.get_mut(mgr) {
            for index in 0..manager.slots().len() as u32 {
                if let Some(slot) = manager.at_mut(index) {
                    if slot.load.map_or(false, |v| !pipeline.contains(v)) {
                        error!("[Load] {}#{} observed a dead load.", mgr, index + 1);
                        slot.load = None;
                    }
                }
            }
        }
    }

    /// Builds the asset of a ready load and installs it in every slot
    /// observing the load.
    pub(crate) fn finalize(&mut self, handle: LoadHandle) {
        let load = match self.pipeline.take(handle) {
            Some(v) => v,
            None => return,
        };

        let PendingLoad {
            name,
            origin,
            finalizer,
            file,
            package,
            compressed,
            buffer,
            read_failed,
            decomp_failed,
            uncompressed_len,
            ..
        } = load;

        drop(file);

        let asset = if read_failed || decomp_failed {
            None
        } else {
            match self.build(finalizer, package, compressed, buffer, uncompressed_len) {
                Ok(asset) => Some(self.assets.create(asset)),
                Err(err) => {
                    warn!("[Load] {:?} failed: {}", name, err);
                    None
                }
            }
        };

        let ring = walk(&mut self.managers, origin);
        let mut installed = 0;
        for &member in &ring.members {
            if let Some(slot) = slot_mut(&mut self.managers, member) {
                if slot.load == Some(handle) {
                    slot.load = None;
                    slot.asset = asset;
                    if slot.kind == SlotKind::Unknown {
                        slot.kind = finalizer.kind();
                    }

                    installed += 1;
                }
            }
        }

        if installed == 0 {
            if let Some(asset) = asset.and_then(|v| self.assets.free(v)) {
                destroy_asset(&mut *self.factory, asset);
            }
        }

        trace!(
            "[Load] {:?} finalized into {} slots (ok: {}).",
            name,
            installed,
            asset.is_some()
        );
    }

    fn build(
        &mut self,
        finalizer: Finalizer,
        package: Option<Arc<dyn Package>>,
        compressed: bool,
        bytes: Vec<u8>,
        uncompressed_len: usize,
    ) -> Result<Asset> {
        let package = match package {
            Some(package) if compressed => Some(package),
            None if compressed => return Err(Error::Decompression("no package".into())),
            _ => None,
        };

        let inflate = |bytes: Vec<u8>| -> Result<Vec<u8>> {
            match package {
                Some(ref package) => {
                    let mut output = alloc_buffer(uncompressed_len)?;
                    package.decompress(&bytes, &mut output)?;
                    Ok(output)
                }
                None => Ok(bytes),
            }
        };

        let asset = match finalizer {
            // Data inflates straight into its aligned buffer.
            Finalizer::Data { align, flags } => match package {
                Some(ref package) => {
                    let mut blob = DataBlob::zeroed(uncompressed_len, align, flags)?;
                    package.decompress(&bytes, blob.bytes_mut())?;
                    Asset::Data(blob)
                }
                None => Asset::Data(DataBlob::copy(&bytes, align, flags)?),
            },
            Finalizer::Texture { mipmaps } => {
                Asset::Texture(self.factory.parse_texture(&inflate(bytes)?, mipmaps)?)
            }
            Finalizer::BitmapFont => Asset::Font(self.factory.parse_bitmap_font(&inflate(bytes)?)?),
            Finalizer::FreetypeFont => {
                Asset::Font(self.factory.parse_freetype_font(&inflate(bytes)?)?)
            }
            Finalizer::Sound => Asset::Sound(self.factory.create_sound(inflate(bytes)?)?),
        };

        Ok(asset)
    }
}

fn check_mark(mark: Mark) -> Result<()> {
    if mark == 0 {
        warn!("[Load] mark 0 names no generation.");
        return Err(Error::InvalidArgument("Mark 0 names no generation.".into()));
    }

    Ok(())
}
