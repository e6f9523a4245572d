//! Host file handles with independent cursors over one shared descriptor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::*;

/// An open host file.
///
/// Cloning (or `dup`) shares the OS descriptor but gives the copy its own
/// position, so a package's file can be handed to many loads at once. All
/// reads are positional and never move a shared OS cursor.
#[derive(Debug, Clone)]
pub struct FileHandle {
    file: Arc<fs::File>,
    path: Arc<PathBuf>,
    size: u64,
    position: u64,
}

impl FileHandle {
    pub fn open<T: AsRef<Path>>(path: T) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        Ok(FileHandle {
            file: Arc::new(file),
            path: Arc::new(path.to_owned()),
            size: metadata.len(),
            position: 0,
        })
    }

    /// A new handle on the same file with a cursor at the same position.
    #[inline]
    pub fn dup(&self) -> FileHandle {
        self.clone()
    }

    /// Returns true if both handles share one OS descriptor.
    #[inline]
    pub fn same_file(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.file, &other.file)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the file when it was opened.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves the cursor. Positions past the end are clamped to it.
    #[inline]
    pub fn seek(&mut self, position: u64) {
        self.position = position.min(self.size);
    }

    /// Reads at the cursor and advances it by the amount read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Fills as much of `buf` as the file holds from `offset` on. Returns the
    /// number of bytes read, which is short only at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match pread(&self.file, &mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(total)
    }
}

#[cfg(unix)]
fn pread(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
