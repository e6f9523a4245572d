use std::sync::Arc;

use crate::errors::*;
use crate::utils::prelude::ObjectPool;

use super::assets::*;
use super::file::FileHandle;
use super::headless::HeadlessFactory;
use super::link::slot_mut;
use super::load::{Finalizer, Pipeline};
use super::package::{Package, PackageHandle, PackageRegistry};
use super::params::ResourceParams;
use super::request::{AsyncIo, ThreadedIo};
use super::slot::{Mark, ResourceId, Slot, SlotKind, SlotRef};
use super::state::ResourceState;
use super::stream::Background;
use super::table::{Manager, ManagerHandle};
use super::vfs::{self, FileList};

/// The `ResourceSystem` owns every resource manager, the registered
/// packages and the load pipeline.
///
/// Everything here is driven from a single client thread. Async reads and
/// background decompression run on worker pools of their own, and their
/// results are picked up by `sync` and `wait`.
pub struct ResourceSystem {
    pub(crate) params: ResourceParams,
    pub(crate) managers: ObjectPool<ManagerHandle, Manager>,
    pub(crate) assets: ObjectPool<AssetHandle, Asset>,
    pub(crate) pipeline: Pipeline,
    pub(crate) packages: PackageRegistry,
    pub(crate) factory: Box<dyn AssetFactory>,
}

impl ResourceSystem {
    /// Creates a new `ResourceSystem` reading through a `ThreadedIo`.
    pub fn new(params: ResourceParams, factory: Box<dyn AssetFactory>) -> Result<Self> {
        params.validate()?;
        let io = ThreadedIo::new(params.async_read_slots, params.io_threads)?;
        ResourceSystem::with_io(params, factory, Arc::new(io))
    }

    /// Creates a new `ResourceSystem` whose assets are backed by a
    /// `HeadlessFactory`.
    pub fn headless(params: ResourceParams) -> Result<Self> {
        ResourceSystem::new(params, Box::new(HeadlessFactory::new()))
    }

    /// Creates a new `ResourceSystem` on top of a custom async read layer.
    pub fn with_io(
        params: ResourceParams,
        factory: Box<dyn AssetFactory>,
        io: Arc<dyn AsyncIo>,
    ) -> Result<Self> {
        params.validate()?;

        let mut system = ResourceSystem {
            params,
            managers: ObjectPool::new(),
            assets: ObjectPool::new(),
            pipeline: Pipeline::new(io),
            packages: PackageRegistry::new(),
            factory,
        };

        let bg = system.params.background;
        if bg.enabled {
            let background = Background::new(bg.threads, bg.queue_limit, bg.threshold, bg.buffer_size)?;
            system.pipeline.set_background(Some(background));
        }

        info!(
            "[ResourceSystem] started with {} read slots, background decompression {}.",
            system.pipeline.io_capacity(),
            if bg.enabled { "on" } else { "off" }
        );

        Ok(system)
    }

    #[inline]
    pub fn params(&self) -> &ResourceParams {
        &self.params
    }

    /// Number of loads not finalized yet, across every manager.
    #[inline]
    pub fn loads_in_flight(&self) -> usize {
        self.pipeline.len()
    }

    /// Number of distinct payloads alive.
    #[inline]
    pub fn live_assets(&self) -> usize {
        self.assets.len()
    }

    // ---- managers ----

    /// Creates a manager with storage for `capacity` slots. Zero picks
    /// `initial_slots` from the params.
    pub fn create_manager(&mut self, capacity: usize) -> Result<ManagerHandle> {
        let capacity = self.initial_capacity(capacity);
        let manager = Manager::new(capacity, self.params.grow_increment)?;
        Ok(self.managers.create(manager))
    }

    /// Creates a manager that reserves its storage lazily, on the first call
    /// that adds a resource to it.
    pub fn declare_manager(&mut self, capacity: usize) -> ManagerHandle {
        let capacity = self.initial_capacity(capacity);
        let manager = Manager::declared(capacity, self.params.grow_increment);
        self.managers.create(manager)
    }

    #[inline]
    fn initial_capacity(&self, capacity: usize) -> usize {
        if capacity == 0 {
            self.params.initial_slots
        } else {
            capacity
        }
    }

    /// Frees every resource of `mgr` and removes it.
    pub fn destroy_manager(&mut self, mgr: ManagerHandle) -> Result<()> {
        self.free_all(mgr)?;
        self.managers.free(mgr);
        debug!("[ResourceSystem] destroyed manager {}.", mgr);
        Ok(())
    }

    pub fn manager(&self, mgr: ManagerHandle) -> Result<&Manager> {
        self.managers.get(mgr).ok_or_else(|| {
            warn!("[ResourceSystem] manager {} is not alive.", mgr);
            Error::InvalidManager(mgr)
        })
    }

    pub(crate) fn manager_mut(&mut self, mgr: ManagerHandle) -> Result<&mut Manager> {
        self.managers.get_mut(mgr).ok_or_else(|| {
            warn!("[ResourceSystem] manager {} is not alive.", mgr);
            Error::InvalidManager(mgr)
        })
    }

    /// The slot named `id`, if it is in use.
    pub fn slot(&self, mgr: ManagerHandle, id: ResourceId) -> Option<&Slot> {
        self.managers.get(mgr).and_then(|v| v.get(id))
    }

    /// Starts a new generation of `mgr`. Loads started before this call
    /// are older than the returned mark.
    pub fn mark(&mut self, mgr: ManagerHandle) -> Result<Mark> {
        Ok(self.manager_mut(mgr)?.mark())
    }

    // ---- loads ----

    /// Loads `name` as an opaque data buffer.
    pub fn load_data(
        &mut self,
        mgr: ManagerHandle,
        name: &str,
        align: usize,
        flags: MemFlags,
    ) -> Result<ResourceId> {
        let align = validate_align(align)?;
        self.load(mgr, name, Finalizer::Data { align, flags })
    }

    pub fn load_texture(&mut self, mgr: ManagerHandle, name: &str, mipmaps: bool) -> Result<ResourceId> {
        self.load(mgr, name, Finalizer::Texture { mipmaps })
    }

    pub fn load_bitmap_font(&mut self, mgr: ManagerHandle, name: &str) -> Result<ResourceId> {
        self.load(mgr, name, Finalizer::BitmapFont)
    }

    pub fn load_freetype_font(&mut self, mgr: ManagerHandle, name: &str) -> Result<ResourceId> {
        self.load(mgr, name, Finalizer::FreetypeFont)
    }

    /// Loads `name` fully into memory as a sound.
    pub fn load_sound(&mut self, mgr: ManagerHandle, name: &str) -> Result<ResourceId> {
        self.load(mgr, name, Finalizer::Sound)
    }

    fn load(&mut self, mgr: ManagerHandle, name: &str, finalizer: Finalizer) -> Result<ResourceId> {
        self.manager(mgr)?;
        if name.is_empty() {
            warn!("[ResourceSystem] load of an empty name.");
            return Err(Error::InvalidArgument("Empty resource name.".into()));
        }

        let resolved = vfs::resolve(&self.packages, &self.params.path_prefix, name).map_err(|err| {
            warn!("[ResourceSystem] can not load {:?}: {}", name, err);
            err
        })?;

        let id = self.manager_mut(mgr)?.register(mgr, finalizer.kind())?;
        let this = SlotRef::new(mgr, id.index() as u32);

        match self.pipeline.start(name, this, finalizer, resolved) {
            Ok(load) => {
                if let Some(slot) = slot_mut(&mut self.managers, this) {
                    slot.load = Some(load);
                }

                trace!("[ResourceSystem] loading {:?} into {}.", name, this);
                Ok(id)
            }
            Err(err) => {
                warn!("[ResourceSystem] can not load {:?}: {}", name, err);
                self.release(this);
                Err(err)
            }
        }
    }

    // ---- resources made by the client ----

    /// Creates a zeroed data buffer of `size` bytes.
    pub fn new_data(
        &mut self,
        mgr: ManagerHandle,
        size: usize,
        align: usize,
        flags: MemFlags,
    ) -> Result<ResourceId> {
        if size == 0 {
            warn!("[ResourceSystem] new_data of zero bytes.");
            return Err(Error::InvalidArgument("Data size must be positive.".into()));
        }

        let align = validate_align(align)?;
        let blob = DataBlob::zeroed(size, align, flags)?;
        self.insert(mgr, SlotKind::Data, Asset::Data(blob))
    }

    /// Creates a data buffer holding a copy of `bytes`.
    pub fn copy_data(
        &mut self,
        mgr: ManagerHandle,
        bytes: &[u8],
        align: usize,
        flags: MemFlags,
    ) -> Result<ResourceId> {
        let align = validate_align(align)?;
        let blob = DataBlob::copy(bytes, align, flags)?;
        self.insert(mgr, SlotKind::Data, Asset::Data(blob))
    }

    /// Creates a data buffer holding `s` and a terminating NUL.
    pub fn strdup(&mut self, mgr: ManagerHandle, s: &str) -> Result<ResourceId> {
        let mut blob = DataBlob::zeroed(s.len() + 1, 1, MemFlags::empty())?;
        blob.bytes_mut()[..s.len()].copy_from_slice(s.as_bytes());
        self.insert(mgr, SlotKind::Data, Asset::Data(blob))
    }

    /// Takes ownership of `bytes` as a data resource. The bytes are moved
    /// into a buffer with the requested alignment.
    pub fn take_data(
        &mut self,
        mgr: ManagerHandle,
        bytes: Vec<u8>,
        align: usize,
        flags: MemFlags,
    ) -> Result<ResourceId> {
        let align = validate_align(align)?;
        let blob = DataBlob::copy(&bytes, align, flags)?;
        self.insert(mgr, SlotKind::Data, Asset::Data(blob))
    }

    pub fn new_texture(&mut self, mgr: ManagerHandle, width: u32, height: u32) -> Result<ResourceId> {
        self.manager(mgr)?;
        let texture = self.factory.create_texture(width, height)?;
        self.insert(mgr, SlotKind::Texture, Asset::Texture(texture))
    }

    pub fn new_texture_from_display(&mut self, mgr: ManagerHandle) -> Result<ResourceId> {
        self.manager(mgr)?;
        let texture = self.factory.create_texture_from_display()?;
        self.insert(mgr, SlotKind::Texture, Asset::Texture(texture))
    }

    /// Takes ownership of a texture made by the factory. It is destroyed
    /// along with the resource.
    pub fn take_texture(&mut self, mgr: ManagerHandle, texture: TextureHandle) -> Result<ResourceId> {
        self.insert(mgr, SlotKind::Texture, Asset::Texture(texture))
    }

    /// Takes ownership of a sound made by the factory.
    pub fn take_sound(&mut self, mgr: ManagerHandle, sound: SoundHandle) -> Result<ResourceId> {
        self.insert(mgr, SlotKind::Sound, Asset::Sound(sound))
    }

    /// `new_data`, returning the buffer as well.
    pub fn get_new_data(
        &mut self,
        mgr: ManagerHandle,
        size: usize,
        align: usize,
        flags: MemFlags,
    ) -> Result<(ResourceId, &mut [u8])> {
        let id = self.new_data(mgr, size, align, flags)?;
        self.created_data(mgr, id)
    }

    /// `copy_data`, returning the copy as well.
    pub fn get_copy_data(
        &mut self,
        mgr: ManagerHandle,
        bytes: &[u8],
        align: usize,
        flags: MemFlags,
    ) -> Result<(ResourceId, &mut [u8])> {
        let id = self.copy_data(mgr, bytes, align, flags)?;
        self.created_data(mgr, id)
    }

    /// `strdup`, returning the copy (without its NUL) as well.
    pub fn get_strdup(&mut self, mgr: ManagerHandle, s: &str) -> Result<(ResourceId, &str)> {
        let id = self.strdup(mgr, s)?;
        let bytes = self.get_data(mgr, id).ok_or(Error::InvalidResource(id.get()))?;
        let text = ::std::str::from_utf8(&bytes[..bytes.len() - 1])
            .map_err(|err| Error::InvalidArgument(err.to_string()))?;
        Ok((id, text))
    }

    fn created_data(&mut self, mgr: ManagerHandle, id: ResourceId) -> Result<(ResourceId, &mut [u8])> {
        let bytes = self
            .get_data_mut(mgr, id)
            .ok_or(Error::InvalidResource(id.get()))?;
        Ok((id, bytes))
    }

    /// Stores a ready asset in a new slot. The asset is destroyed if no slot
    /// can be allocated.
    fn insert(&mut self, mgr: ManagerHandle, kind: SlotKind, asset: Asset) -> Result<ResourceId> {
        let id = match self.manager_mut(mgr).and_then(|v| v.register(mgr, kind)) {
            Ok(id) => id,
            Err(err) => {
                destroy_asset(&mut *self.factory, asset);
                return Err(err);
            }
        };

        let handle = self.assets.create(asset);
        if let Some(slot) = slot_mut(&mut self.managers, SlotRef::new(mgr, id.index() as u32)) {
            slot.asset = Some(handle);
        }

        Ok(id)
    }

    fn release(&mut self, this: SlotRef) {
        if let Some(manager) = self.managers.get_mut(this.manager) {
            manager.release(this.manager, this.index);
        }
    }

    // ---- getters ----

    fn lookup(&self, mgr: ManagerHandle, id: ResourceId) -> Result<&Slot> {
        self.manager(mgr)?.get(id).ok_or_else(|| {
            warn!("[ResourceSystem] resource {}#{} is not in use.", mgr, id);
            Error::InvalidResource(id.get())
        })
    }

    /// The payload of a slot of kind `expected`. `Ok(None)` while it is
    /// loading, after a failed load, or once the link went stale.
    fn payload(
        &self,
        mgr: ManagerHandle,
        id: ResourceId,
        expected: SlotKind,
    ) -> Result<Option<AssetHandle>> {
        let slot = self.lookup(mgr, id)?;
        if slot.kind != expected && !slot.stale {
            warn!(
                "[ResourceSystem] resource {}#{} holds {:?}, expected {:?}.",
                mgr, id, slot.kind, expected
            );

            return Err(Error::WrongKind {
                id: id.get(),
                found: slot.kind,
                expected,
            });
        }

        Ok(slot.asset)
    }

    fn asset(&self, mgr: ManagerHandle, id: ResourceId, expected: SlotKind) -> Option<&Asset> {
        let handle = self.payload(mgr, id, expected).ok()??;
        self.assets.get(handle)
    }

    pub fn get_data(&self, mgr: ManagerHandle, id: ResourceId) -> Option<&[u8]> {
        match self.asset(mgr, id, SlotKind::Data)? {
            Asset::Data(blob) => Some(blob.bytes()),
            _ => None,
        }
    }

    pub fn get_data_mut(&mut self, mgr: ManagerHandle, id: ResourceId) -> Option<&mut [u8]> {
        let handle = self.payload(mgr, id, SlotKind::Data).ok()??;
        match self.assets.get_mut(handle)? {
            Asset::Data(blob) => Some(blob.bytes_mut()),
            _ => None,
        }
    }

    /// Byte size of a data resource.
    pub fn get_size(&self, mgr: ManagerHandle, id: ResourceId) -> Option<usize> {
        self.get_data(mgr, id).map(|v| v.len())
    }

    pub fn get_texture(&self, mgr: ManagerHandle, id: ResourceId) -> Option<TextureHandle> {
        match self.asset(mgr, id, SlotKind::Texture)? {
            Asset::Texture(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn get_font(&self, mgr: ManagerHandle, id: ResourceId) -> Option<FontHandle> {
        match self.asset(mgr, id, SlotKind::Font)? {
            Asset::Font(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn get_sound(&self, mgr: ManagerHandle, id: ResourceId) -> Option<SoundHandle> {
        match self.asset(mgr, id, SlotKind::Sound)? {
            Asset::Sound(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn resource_state(&self, mgr: ManagerHandle, id: ResourceId) -> ResourceState {
        match self.slot(mgr, id) {
            Some(slot) if slot.load.is_some() => ResourceState::NotReady,
            Some(slot) if slot.asset.is_some() => ResourceState::Ok,
            _ => ResourceState::Err,
        }
    }

    // ---- files ----

    /// Opens `name` as a readable file resource. Compressed package members
    /// can not be opened.
    pub fn open_file(&mut self, mgr: ManagerHandle, name: &str) -> Result<ResourceId> {
        let slice = self.open_slice(mgr, name)?;
        self.insert(mgr, SlotKind::File, Asset::File(slice))
    }

    fn open_slice(&self, mgr: ManagerHandle, name: &str) -> Result<FileSlice> {
        self.manager(mgr)?;
        let resolved = vfs::resolve(&self.packages, &self.params.path_prefix, name).map_err(|err| {
            warn!("[ResourceSystem] can not open {:?}: {}", name, err);
            err
        })?;

        if resolved.compressed {
            warn!("[ResourceSystem] {:?} is compressed and can not be opened.", name);
            return Err(Error::InvalidArgument(format!(
                "{:?} is stored compressed.",
                name
            )));
        }

        Ok(FileSlice::new(
            resolved.file.dup(),
            resolved.offset,
            resolved.stored_len,
        ))
    }

    pub fn get_file_handle(&self, mgr: ManagerHandle, id: ResourceId) -> Option<&FileSlice> {
        match self.asset(mgr, id, SlotKind::File)? {
            Asset::File(slice) => Some(slice),
            _ => None,
        }
    }

    fn file_mut(&mut self, mgr: ManagerHandle, id: ResourceId) -> Result<&mut FileSlice> {
        let handle = self
            .payload(mgr, id, SlotKind::File)?
            .ok_or(Error::StaleLink(id.get()))?;

        match self.assets.get_mut(handle) {
            Some(Asset::File(slice)) => Ok(slice),
            _ => Err(Error::InvalidResource(id.get())),
        }
    }

    pub fn get_file_size(&self, mgr: ManagerHandle, id: ResourceId) -> Option<u64> {
        self.get_file_handle(mgr, id).map(|v| v.size())
    }

    pub fn get_file_position(&self, mgr: ManagerHandle, id: ResourceId) -> Option<u64> {
        self.get_file_handle(mgr, id).map(|v| v.position())
    }

    /// Moves the cursor of a file resource, clamped to its size.
    pub fn set_file_position(&mut self, mgr: ManagerHandle, id: ResourceId, position: u64) -> Result<()> {
        self.file_mut(mgr, id)?.seek(position);
        Ok(())
    }

    /// Reads at the cursor of a file resource and advances it.
    pub fn read_file(&mut self, mgr: ManagerHandle, id: ResourceId, buf: &mut [u8]) -> Result<usize> {
        self.file_mut(mgr, id)?.read(buf)
    }

    /// Reads at `position` of a file resource. The cursor is left alone.
    pub fn read_file_at(
        &self,
        mgr: ManagerHandle,
        id: ResourceId,
        buf: &mut [u8],
        position: u64,
    ) -> Result<usize> {
        let slice = self
            .get_file_handle(mgr, id)
            .ok_or(Error::InvalidResource(id.get()))?;
        slice.read_at(buf, position)
    }

    /// Opens `name` as a sound streamed from its file.
    pub fn open_sound(&mut self, mgr: ManagerHandle, name: &str) -> Result<ResourceId> {
        let slice = self.open_slice(mgr, name)?;
        let sound = self
            .factory
            .create_sound_stream(slice.file, slice.base, slice.size)?;
        self.insert(mgr, SlotKind::Sound, Asset::Sound(sound))
    }

    /// Turns the file resource `file_id` of `file_mgr` into a sound streamed
    /// from it. The file resource is freed.
    pub fn open_sound_from_file(
        &mut self,
        mgr: ManagerHandle,
        file_mgr: ManagerHandle,
        file_id: ResourceId,
    ) -> Result<ResourceId> {
        self.manager(mgr)?;
        let (file, base, size) = match self.get_file_handle(file_mgr, file_id) {
            Some(slice) => (slice.file().dup(), slice.base(), slice.size()),
            None => return Err(Error::InvalidResource(file_id.get())),
        };

        let sound = self.factory.create_sound_stream(file, base, size)?;
        let id = self.insert(mgr, SlotKind::Sound, Asset::Sound(sound))?;
        self.free(file_mgr, file_id)?;
        Ok(id)
    }

    // ---- names ----

    /// Returns true if `name` resolves to a package member or a host file.
    pub fn exists(&self, name: &str) -> bool {
        vfs::exists(&self.packages, &self.params.path_prefix, name)
    }

    /// Enumerates the files below `dir`.
    pub fn list_files(&self, dir: &str, recursive: bool) -> FileList {
        FileList::new(&self.packages, &self.params.path_prefix, dir, recursive)
    }

    // ---- packages ----

    /// Mounts `package` under its prefix.
    pub fn register_package<T>(&mut self, package: T) -> Result<PackageHandle>
    where
        T: Package + 'static,
    {
        self.packages.register(Box::new(package))
    }

    pub fn unregister_package(&mut self, handle: PackageHandle) -> Result<Arc<dyn Package>> {
        self.packages.unregister(handle)
    }

    /// Turns background decompression on or off. Loads streaming on the
    /// previous worker pool are collected before it is replaced.
    pub fn set_background_decompression(
        &mut self,
        enabled: bool,
        threshold: u64,
        buffer_size: usize,
        threads: usize,
    ) -> Result<()> {
        let mut params = self.params.background;
        params.enabled = enabled;
        params.threshold = threshold;
        params.buffer_size = buffer_size;
        params.threads = threads;
        params.validate()?;

        let background = if enabled {
            Some(Background::new(threads, params.queue_limit, threshold, buffer_size)?)
        } else {
            None
        };

        self.pipeline.set_background(background);
        self.params.background = params;
        info!(
            "[ResourceSystem] background decompression {} (threshold {}, buffer {}, {} threads).",
            if enabled { "on" } else { "off" },
            threshold,
            buffer_size,
            threads
        );

        Ok(())
    }

    /// While set, `sync` sees every load as unfinished. `wait` is not
    /// affected.
    pub fn set_block_loads(&mut self, block: bool) {
        self.pipeline.set_block_loads(block);
    }

    /// The file a resource name resolves to, for callers that read it on
    /// their own.
    pub fn resolve_file(&self, name: &str) -> Result<(FileHandle, u64, u64)> {
        let resolved = vfs::resolve(&self.packages, &self.params.path_prefix, name)?;
        Ok((resolved.file, resolved.offset, resolved.stored_len))
    }
}

impl Drop for ResourceSystem {
    fn drop(&mut self) {
        let managers: Vec<ManagerHandle> = self.managers.keys().collect();
        for mgr in managers {
            let _ = self.free_all(mgr);
        }

        self.pipeline.set_background(None);
    }
}
