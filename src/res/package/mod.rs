//! Packages bundle many named resources in one archive.
//!
//! A package is mounted under a path prefix. Every name starting with that
//! prefix (compared case-insensitively) is answered by the package alone;
//! there is no fallback to the host filesystem for it.

pub mod archive;
pub mod builder;
pub mod format;
pub mod inflate;

pub mod prelude {
    pub use super::archive::PkgArchive;
    pub use super::builder::PackageBuilder;
    pub use super::inflate::{Inflate, StreamDecompressor};
    pub use super::{Package, PackageEntry, PackageHandle};
}

use std::sync::Arc;

use crate::errors::*;
use crate::utils::prelude::HandlePool;

use super::file::FileHandle;
use super::location;

use self::inflate::StreamDecompressor;

impl_handle!(PackageHandle);

/// Where the bytes of a package member live.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// The package's own file. Shared, so callers that move a cursor must
    /// `dup` it first.
    pub file: FileHandle,
    /// Absolute offset within `file`.
    pub offset: u64,
    pub stored_len: u64,
    pub compressed: bool,
    pub uncompressed_len: u64,
}

pub trait Package: Send + Sync {
    /// The path prefix the package is mounted under, e.g. `"pkg/"`.
    fn prefix(&self) -> &str;

    /// Opens the package. Called once, when it is registered.
    fn init(&mut self) -> Result<()>;

    /// Releases whatever `init` acquired. Called when it is unregistered.
    fn cleanup(&mut self);

    /// Looks up `name`, given without the package prefix.
    fn file_info(&self, name: &str) -> Option<PackageEntry>;

    /// Names of every member, without the package prefix.
    fn list_files(&self) -> Vec<String>;

    /// Decoder state for one streaming load. `None` if the package can not
    /// stream.
    fn decompress_init(&self) -> Option<Box<dyn StreamDecompressor>>;

    /// Decodes a whole member at once. `output` has exactly the uncompressed
    /// length.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
}

/// The registered packages, in registration order.
#[derive(Default)]
pub struct PackageRegistry {
    handles: HandlePool<PackageHandle>,
    packages: Vec<(PackageHandle, Arc<dyn Package>)>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        PackageRegistry::default()
    }

    /// Initializes and mounts `package`. Nothing is mounted if a package
    /// with the same prefix exists or if `init` fails.
    pub fn register(&mut self, mut package: Box<dyn Package>) -> Result<PackageHandle> {
        let prefix = package.prefix().to_owned();
        if self
            .packages
            .iter()
            .any(|(_, v)| v.prefix().eq_ignore_ascii_case(&prefix))
        {
            return Err(Error::PackageExists(prefix));
        }

        package.init()?;

        let handle = self.handles.create();
        self.packages.push((handle, Arc::from(package)));
        info!("[PackageRegistry] mounted package {:?} as {}.", prefix, handle);
        Ok(handle)
    }

    /// Unmounts the package and hands it back after `cleanup`. Fails if a
    /// load still holds on to it.
    pub fn unregister(&mut self, handle: PackageHandle) -> Result<Arc<dyn Package>> {
        let index = self
            .packages
            .iter()
            .position(|(h, _)| *h == handle)
            .ok_or_else(|| Error::NotFound(format!("package {}", handle)))?;

        match Arc::get_mut(&mut self.packages[index].1) {
            Some(package) => package.cleanup(),
            None => {
                return Err(Error::InvalidArgument(format!(
                    "Package {} is still in use.",
                    handle
                )))
            }
        }

        self.handles.free(handle);
        let (_, package) = self.packages.remove(index);
        info!("[PackageRegistry] unmounted package {:?}.", package.prefix());
        Ok(package)
    }

    #[inline]
    pub fn get(&self, handle: PackageHandle) -> Option<&Arc<dyn Package>> {
        self.packages
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, v)| v)
    }

    /// The package mounted over `name`, with the rest of the name.
    pub fn find<'a>(&self, name: &'a str) -> Option<(&Arc<dyn Package>, &'a str)> {
        self.packages.iter().find_map(|(_, v)| {
            location::strip_prefix_ci(name, v.prefix()).map(|rest| (v, rest))
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
