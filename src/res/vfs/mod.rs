//! Name resolution over the registered packages and the host filesystem.

pub mod dir;
pub use self::dir::{HostWalker, MAX_LIST_DEPTH};

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::vec;

use crate::errors::*;

use super::file::FileHandle;
use super::location;
use super::package::{Package, PackageRegistry};

/// Where the bytes of a resource are.
pub struct Resolved {
    pub file: FileHandle,
    pub offset: u64,
    pub stored_len: u64,
    pub compressed: bool,
    pub uncompressed_len: u64,
    /// The package answering the name, if any. Its file handle is shared;
    /// a host file is opened for this resource alone.
    pub package: Option<Arc<dyn Package>>,
}

/// Locates `name`. A package whose prefix matches answers definitively.
pub fn resolve(packages: &PackageRegistry, prefix: &Path, name: &str) -> Result<Resolved> {
    if let Some((package, rest)) = packages.find(name) {
        let entry = package
            .file_info(rest)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;

        return Ok(Resolved {
            file: entry.file,
            offset: entry.offset,
            stored_len: entry.stored_len,
            compressed: entry.compressed,
            uncompressed_len: entry.uncompressed_len,
            package: Some(package.clone()),
        });
    }

    let path = location::host_path(prefix, name);
    let file = FileHandle::open(&path).map_err(|err| match err {
        Error::IO(ref io) if io.kind() == io::ErrorKind::NotFound => Error::NotFound(name.to_owned()),
        err => err,
    })?;

    let size = file.size();
    Ok(Resolved {
        file,
        offset: 0,
        stored_len: size,
        compressed: false,
        uncompressed_len: size,
        package: None,
    })
}

/// Returns true if `name` can be resolved.
pub fn exists(packages: &PackageRegistry, prefix: &Path, name: &str) -> bool {
    match packages.find(name) {
        Some((package, rest)) => package.file_info(rest).is_some(),
        None => location::host_path(prefix, name).is_file(),
    }
}

enum Source {
    Package(vec::IntoIter<String>),
    Host(HostWalker),
    Empty,
}

/// An enumeration of the files below a directory.
///
/// Names are relative to the listed directory. `next_name` lends each one
/// until the next call; the list is also an `Iterator` of owned names.
pub struct FileList {
    source: Source,
    current: String,
}

impl FileList {
    /// Lists `dir`, descending into subdirectories if `recursive` is set.
    pub fn new(packages: &PackageRegistry, prefix: &Path, dir: &str, recursive: bool) -> Self {
        let mut folder = dir.to_owned();
        if !folder.is_empty() && !folder.ends_with('/') {
            folder.push('/');
        }

        let source = match packages.find(&folder) {
            Some((package, rest)) => {
                let mut names: Vec<String> = package
                    .list_files()
                    .into_iter()
                    .filter_map(|v| location::strip_prefix_ci(&v, rest).map(|v| v.to_owned()))
                    .filter(|v| recursive || !v.contains('/'))
                    .collect();

                names.sort();
                Source::Package(names.into_iter())
            }
            None => match HostWalker::new(location::host_path(prefix, dir), recursive) {
                Ok(walker) => Source::Host(walker),
                Err(err) => {
                    warn!("[FileList] can not list {:?}: {}", dir, err);
                    Source::Empty
                }
            },
        };

        FileList {
            source,
            current: String::new(),
        }
    }

    /// The next name, valid until the next call.
    pub fn next_name(&mut self) -> Option<&str> {
        let name = self.next()?;
        self.current = name;
        Some(&self.current)
    }
}

impl Iterator for FileList {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self.source {
            Source::Package(ref mut names) => names.next(),
            Source::Host(ref mut walker) => walker.next(),
            Source::Empty => None,
        }
    }
}
