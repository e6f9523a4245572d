use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::errors::*;

use super::format::{self, Entry, Header, FLAG_DEFLATED, NAME_OFFSET_MASK};

struct Member {
    name: String,
    bytes: Vec<u8>,
    deflate: bool,
}

/// Writes package archives.
///
/// ```no_run
/// use respak::res::package::prelude::PackageBuilder;
///
/// let mut builder = PackageBuilder::new();
/// builder.add("readme.txt", b"hello".to_vec(), false);
/// builder.add("level1.bin", vec![0; 4096], true);
/// builder.save("assets.pkg").unwrap();
/// ```
pub struct PackageBuilder {
    members: Vec<Member>,
    level: Compression,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        PackageBuilder::new()
    }
}

impl PackageBuilder {
    pub fn new() -> Self {
        PackageBuilder {
            members: Vec::new(),
            level: Compression::default(),
        }
    }

    /// Sets the deflate level, from 0 to 9.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Adds a member. With `deflate` its bytes are stored compressed.
    pub fn add<T: Into<String>>(&mut self, name: T, bytes: Vec<u8>, deflate: bool) -> &mut Self {
        self.members.push(Member {
            name: name.into(),
            bytes,
            deflate,
        });
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Serializes the package into `dst`.
    pub fn write<W: Write>(&self, dst: &mut W) -> Result<()> {
        let mut order: Vec<(u32, &Member)> = self
            .members
            .iter()
            .map(|v| (format::hash(&v.name), v))
            .collect();

        order.sort_by(|a, b| format::compare_keys(a.0, a.1.name.as_bytes(), b.0, b.1.name.as_bytes()));

        for pair in order.windows(2) {
            if pair[0].0 == pair[1].0 && pair[0].1.name.eq_ignore_ascii_case(&pair[1].1.name) {
                return Err(Error::InvalidArgument(format!(
                    "Package member {:?} is added twice.",
                    pair[1].1.name
                )));
            }
        }

        let mut names = Vec::new();
        let mut payloads = Vec::with_capacity(order.len());
        let mut entries = Vec::with_capacity(order.len());
        for &(hash, member) in &order {
            if member.name.is_empty() || member.name.as_bytes().contains(&0) {
                return Err(Error::InvalidArgument(format!(
                    "Bad package member name {:?}.",
                    member.name
                )));
            }

            let name_offset = names.len() as u32;
            if name_offset > NAME_OFFSET_MASK {
                return Err(Error::InvalidArgument("Names blob exceeds 16 MiB.".into()));
            }

            names.extend_from_slice(member.name.as_bytes());
            names.push(0);

            let payload = if member.deflate {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
                encoder.write_all(&member.bytes)?;
                encoder.finish()?
            } else {
                member.bytes.clone()
            };

            let flags = if member.deflate { FLAG_DEFLATED } else { 0 };
            entries.push(Entry {
                hash,
                nameofs_flags: flags | name_offset,
                offset: 0,
                stored_len: to_u32(payload.len())?,
                uncompressed_len: to_u32(member.bytes.len())?,
            });

            payloads.push(payload);
        }

        let header = Header {
            entry_count: to_u32(entries.len())?,
            names_len: to_u32(names.len())?,
        };

        let mut offset = header.directory_len();
        for (entry, payload) in entries.iter_mut().zip(&payloads) {
            entry.offset = to_u32(offset as usize)?;
            offset += payload.len() as u64;
        }

        to_u32(offset as usize)?;

        header.write(dst)?;
        for entry in &entries {
            entry.write(dst)?;
        }

        dst.write_all(&names)?;
        for payload in &payloads {
            dst.write_all(payload)?;
        }

        Ok(())
    }

    /// Serializes the package into a new file at `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let mut dst = BufWriter::new(fs::File::create(path)?);
        self.write(&mut dst)?;
        dst.flush()?;
        Ok(())
    }
}

fn to_u32(v: usize) -> Result<u32> {
    if v > u32::max_value() as usize {
        return Err(Error::InvalidArgument(format!(
            "{} does not fit a package archive.",
            v
        )));
    }

    Ok(v as u32)
}
