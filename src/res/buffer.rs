//! Heap buffers with a caller chosen alignment.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::errors::*;

/// An owned, zero initialized byte buffer whose first byte is aligned to
/// `align`.
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The buffer is uniquely owned plain bytes.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocates `len` zeroed bytes. `align` must be a power of two.
    pub fn zeroed(len: usize, align: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len, align.max(1)).map_err(|_| {
            Error::InvalidArgument(format!("Bad buffer layout: {} bytes at {}.", len, align))
        })?;

        if layout.size() == 0 {
            // Zero sized allocations are not allowed; any aligned address will do.
            let ptr = NonNull::new(layout.align() as *mut u8).ok_or(Error::OutOfMemory)?;
            return Ok(AlignedBuf { ptr, layout });
        }

        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::OutOfMemory)?;
        Ok(AlignedBuf { ptr, layout })
    }

    /// Allocates a buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8], align: usize) -> Result<Self> {
        let mut buf = AlignedBuf::zeroed(bytes.len(), align)?;
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for AlignedBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("ptr", &self.ptr.as_ptr())
            .field("len", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}
