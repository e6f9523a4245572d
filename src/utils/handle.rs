use std::fmt;
use std::hash::Hash;

/// Slot index (or version) of a handle.
pub type HandleIndex = u32;

/// A generational reference into a pool, packed into one word.
///
/// The upper half is the slot index, the lower half the version of the slot
/// when the handle was issued. Pools bump the version on every create and
/// free, so live versions are always odd and a handle outlives its slot
/// without ever aliasing the next owner.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The handle that never refers to anything.
    pub const NIL: Handle = Handle(0);

    #[inline]
    pub fn new(index: HandleIndex, version: HandleIndex) -> Self {
        Handle((u64::from(index) << 32) | u64::from(version))
    }

    #[inline]
    pub fn nil() -> Self {
        Handle::NIL
    }

    /// Returns true if a pool could have issued this handle.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.version() & 0x1 == 1
    }

    #[inline]
    pub fn invalidate(&mut self) {
        *self = Handle::NIL;
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        (self.0 >> 32) as HandleIndex
    }

    #[inline]
    pub fn version(self) -> HandleIndex {
        self.0 as HandleIndex
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.index(), self.version())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle({})", self)
    }
}

/// Anything a `HandlePool` can hand out. Implementors only wrap a `Handle`;
/// use `impl_handle!` to declare one.
pub trait HandleLike: fmt::Debug + fmt::Display + Copy + Hash + Eq + Send + Sync {
    fn from_handle(handle: Handle) -> Self;
    fn handle(&self) -> Handle;

    #[inline]
    fn new(index: HandleIndex, version: HandleIndex) -> Self {
        Self::from_handle(Handle::new(index, version))
    }

    #[inline]
    fn index(&self) -> HandleIndex {
        self.handle().index()
    }

    #[inline]
    fn version(&self) -> HandleIndex {
        self.handle().version()
    }
}

impl HandleLike for Handle {
    #[inline]
    fn from_handle(handle: Handle) -> Self {
        handle
    }

    #[inline]
    fn handle(&self) -> Handle {
        *self
    }
}

/// Declares a typed wrapper around `Handle`. Handles of different pools get
/// different types and can not be passed for one another.
#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::utils::handle::Handle);

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn from_handle(handle: $crate::utils::handle::Handle) -> Self {
                $name(handle)
            }

            #[inline]
            fn handle(&self) -> $crate::utils::handle::Handle {
                self.0
            }
        }

        impl $name {
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0.is_valid()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}
