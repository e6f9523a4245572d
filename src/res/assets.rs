//! Payloads held by resource slots, and the factory that turns loaded bytes
//! into device objects.

use bitflags::bitflags;

use crate::errors::*;

use super::buffer::AlignedBuf;
use super::file::FileHandle;

impl_handle!(AssetHandle);
impl_handle!(TextureHandle);
impl_handle!(FontHandle);
impl_handle!(SoundHandle);

bitflags! {
    /// Allocation class of data buffers. `TOP` and `TEMP` are advisory: they
    /// are kept with the buffer for the client to inspect but do not change
    /// where it is allocated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemFlags: u32 {
        /// Prefer the top of the heap.
        const TOP = 1 << 0;
        /// The buffer is short lived.
        const TEMP = 1 << 1;
        /// The buffer must start zeroed. Buffers from `new_data` always are.
        const CLEAR = 1 << 2;
    }
}

/// Normalizes an alignment hint. Zero picks the default; anything else must
/// be a power of two.
pub fn validate_align(align: usize) -> Result<usize> {
    match align {
        0 => Ok(1),
        v if v.is_power_of_two() => Ok(v),
        v => Err(Error::InvalidArgument(format!(
            "Alignment {} is not a power of two.",
            v
        ))),
    }
}

/// Bytes owned by a data resource, starting at the requested alignment.
#[derive(Debug)]
pub struct DataBlob {
    pub(crate) bytes: AlignedBuf,
    pub(crate) flags: MemFlags,
}

impl DataBlob {
    /// A zeroed blob of `len` bytes.
    pub fn zeroed(len: usize, align: usize, flags: MemFlags) -> Result<Self> {
        Ok(DataBlob {
            bytes: AlignedBuf::zeroed(len, align)?,
            flags,
        })
    }

    /// A blob holding a copy of `bytes`.
    pub fn copy(bytes: &[u8], align: usize, flags: MemFlags) -> Result<Self> {
        Ok(DataBlob {
            bytes: AlignedBuf::from_slice(bytes, align)?,
            flags,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.bytes.align()
    }

    #[inline]
    pub fn flags(&self) -> MemFlags {
        self.flags
    }
}

/// A window of a host file, read through its own cursor.
#[derive(Debug, Clone)]
pub struct FileSlice {
    pub(crate) file: FileHandle,
    pub(crate) base: u64,
    pub(crate) size: u64,
    pub(crate) position: u64,
}

impl FileSlice {
    pub fn new(file: FileHandle, base: u64, size: u64) -> Self {
        FileSlice {
            file,
            base,
            size,
            position: 0,
        }
    }

    #[inline]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// Offset of the first byte within the host file.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn seek(&mut self, position: u64) {
        self.position = position.min(self.size);
    }

    /// Reads at `position`, never past the end of the slice.
    pub fn read_at(&self, buf: &mut [u8], position: u64) -> Result<usize> {
        if position >= self.size {
            return Ok(0);
        }

        let len = (buf.len() as u64).min(self.size - position) as usize;
        self.file.read_at(&mut buf[..len], self.base + position)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// The payload shared by every slot of a ring.
#[derive(Debug)]
pub enum Asset {
    Data(DataBlob),
    Texture(TextureHandle),
    Font(FontHandle),
    Sound(SoundHandle),
    File(FileSlice),
}

/// Device side of the resource system. Parsers get the fully loaded (and
/// decompressed) bytes of a resource; destructors are called exactly once per
/// object the factory handed out.
pub trait AssetFactory: Send {
    fn parse_texture(
        &mut self,
        bytes: &[u8],
        mipmaps: bool,
    ) -> ::std::result::Result<TextureHandle, failure::Error>;

    fn parse_bitmap_font(&mut self, bytes: &[u8])
        -> ::std::result::Result<FontHandle, failure::Error>;

    fn parse_freetype_font(
        &mut self,
        bytes: &[u8],
    ) -> ::std::result::Result<FontHandle, failure::Error>;

    fn create_sound(&mut self, bytes: Vec<u8>) -> ::std::result::Result<SoundHandle, failure::Error>;

    /// Creates a sound that streams `len` bytes of `file` starting at
    /// `offset`.
    fn create_sound_stream(
        &mut self,
        file: FileHandle,
        offset: u64,
        len: u64,
    ) -> ::std::result::Result<SoundHandle, failure::Error>;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
    ) -> ::std::result::Result<TextureHandle, failure::Error>;

    /// Creates a texture holding the current contents of the display.
    fn create_texture_from_display(&mut self)
        -> ::std::result::Result<TextureHandle, failure::Error>;

    fn destroy_texture(&mut self, handle: TextureHandle);
    fn destroy_font(&mut self, handle: FontHandle);
    fn destroy_sound(&mut self, handle: SoundHandle);
}

/// Releases whatever device object `asset` owns.
pub(crate) fn destroy_asset(factory: &mut dyn AssetFactory, asset: Asset) {
    match asset {
        Asset::Texture(handle) => factory.destroy_texture(handle),
        Asset::Font(handle) => factory.destroy_font(handle),
        Asset::Sound(handle) => factory.destroy_sound(handle),
        Asset::Data(_) | Asset::File(_) => {}
    }
}
