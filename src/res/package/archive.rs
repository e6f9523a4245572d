use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::res::file::FileHandle;

use super::format::{self, Entry, Header, HEADER_SIZE};
use super::inflate::{self, DeflateStream, StreamDecompressor};
use super::{Package, PackageEntry};

/// A package archive stored in a host file, possibly at an offset inside a
/// larger container.
pub struct PkgArchive {
    prefix: String,
    path: PathBuf,
    base: u64,
    len: Option<u64>,
    file: Option<FileHandle>,
    entries: Vec<Entry>,
    names: Vec<u8>,
}

impl PkgArchive {
    /// An archive spanning the whole file at `path`.
    pub fn new<T1, T2>(prefix: T1, path: T2) -> Self
    where
        T1: Into<String>,
        T2: Into<PathBuf>,
    {
        PkgArchive {
            prefix: prefix.into(),
            path: path.into(),
            base: 0,
            len: None,
            file: None,
            entries: Vec::new(),
            names: Vec::new(),
        }
    }

    /// An archive of `len` bytes starting at `base` inside the file at
    /// `path`.
    pub fn embedded<T1, T2>(prefix: T1, path: T2, base: u64, len: u64) -> Self
    where
        T1: Into<String>,
        T2: Into<PathBuf>,
    {
        let mut archive = PkgArchive::new(prefix, path);
        archive.base = base;
        archive.len = Some(len);
        archive
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes the archive spans. Zero until it is opened.
    #[inline]
    pub fn len(&self) -> u64 {
        if self.file.is_some() {
            self.len.unwrap_or(0)
        } else {
            0
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every index record with its name, in index order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        let names = &self.names;
        self.entries.iter().map(move |e| {
            let name = format::name_at(names, e.name_offset()).unwrap_or_default();
            (::std::str::from_utf8(name).unwrap_or_default(), e)
        })
    }

    fn name_of(&self, entry: &Entry) -> &[u8] {
        format::name_at(&self.names, entry.name_offset()).unwrap_or_default()
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        let hash = format::hash(name);
        self.entries
            .binary_search_by(|e| format::compare_keys(e.hash, self.name_of(e), hash, name.as_bytes()))
            .ok()
            .map(|index| &self.entries[index])
    }

    fn open(&self) -> Result<(FileHandle, u64, Vec<Entry>, Vec<u8>)> {
        let display = self.path.display().to_string();
        let file = FileHandle::open(&self.path)?;

        if self.base > file.size() {
            return Err(Error::Malformed(display, "base offset past end of file".into()));
        }

        let len = match self.len {
            Some(len) if self.base + len <= file.size() => len,
            Some(_) => return Err(Error::Malformed(display, "length past end of file".into())),
            None => file.size() - self.base,
        };

        let mut bytes = [0; HEADER_SIZE];
        if file.read_at(&mut bytes, self.base)? != HEADER_SIZE {
            return Err(Error::Malformed(display, "short header".into()));
        }

        let header = Header::read(&mut &bytes[..], &display)?;
        if header.directory_len() > len {
            return Err(Error::Malformed(display, "index past end of package".into()));
        }

        let index_len = header.entry_count as usize * format::ENTRY_SIZE;
        let mut directory = vec![0; index_len + header.names_len as usize];
        if file.read_at(&mut directory, self.base + HEADER_SIZE as u64)? != directory.len() {
            return Err(Error::Malformed(display, "short index".into()));
        }

        let names = directory.split_off(index_len);
        let mut src = &directory[..];
        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let entry = Entry::read(&mut src)?;
            match format::name_at(&names, entry.name_offset()) {
                Some(name) if ::std::str::from_utf8(name).is_ok() => {}
                _ => {
                    return Err(Error::Malformed(
                        display,
                        format!("bad name offset {}", entry.name_offset()),
                    ))
                }
            }

            entries.push(entry);
        }

        for pair in entries.windows(2) {
            let a = format::name_at(&names, pair[0].name_offset()).unwrap_or_default();
            let b = format::name_at(&names, pair[1].name_offset()).unwrap_or_default();
            if format::compare_keys(pair[0].hash, a, pair[1].hash, b) != ::std::cmp::Ordering::Less {
                return Err(Error::Malformed(display, "index is not sorted".into()));
            }
        }

        Ok((file, len, entries, names))
    }
}

impl Package for PkgArchive {
    #[inline]
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn init(&mut self) -> Result<()> {
        let (file, len, entries, names) = self.open()?;
        debug!(
            "[PkgArchive] opened {:?} with {} entries.",
            self.path,
            entries.len()
        );

        self.file = Some(file);
        self.len = Some(len);
        self.entries = entries;
        self.names = names;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.file = None;
        self.entries = Vec::new();
        self.names = Vec::new();
    }

    fn file_info(&self, name: &str) -> Option<PackageEntry> {
        let file = self.file.as_ref()?;
        let entry = self.find(name)?;

        let len = self.len.unwrap_or(0);
        let offset = u64::from(entry.offset).min(len);
        let stored_len = u64::from(entry.stored_len).min(len - offset);

        Some(PackageEntry {
            file: file.dup(),
            offset: self.base + offset,
            stored_len,
            compressed: entry.is_deflated(),
            uncompressed_len: u64::from(entry.uncompressed_len),
        })
    }

    fn list_files(&self) -> Vec<String> {
        self.entries().map(|(name, _)| name.to_owned()).collect()
    }

    fn decompress_init(&self) -> Option<Box<dyn StreamDecompressor>> {
        Some(Box::new(DeflateStream::new()))
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        inflate::inflate_into(input, output)
    }
}
