//! On-disk layout of package archives.
//!
//! ```text
//! +--------+----------------------+-------------+------------------+
//! | header | index (count * 20 B) | names blob  | entry data ...   |
//! +--------+----------------------+-------------+------------------+
//! ```
//!
//! Every integer is big-endian. Entry offsets are relative to the start of
//! the package, so a package can be embedded in a larger container.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::*;

pub const MAGIC: [u8; 4] = *b"PKG\0";
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 16;
pub const ENTRY_SIZE: usize = 20;

/// Entry data is stored as a raw deflate stream.
pub const FLAG_DEFLATED: u32 = 1 << 24;
pub const NAME_OFFSET_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub entry_count: u32,
    pub names_len: u32,
}

impl Header {
    pub fn read<R: Read>(src: &mut R, name: &str) -> Result<Header> {
        let mut magic = [0; 4];
        src.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(malformed(name, format!("bad magic {:?}", magic)));
        }

        let version = src.read_u8()?;
        if version != VERSION {
            return Err(malformed(name, format!("unsupported version {}", version)));
        }

        let header_size = src.read_u8()? as usize;
        let entry_size = src.read_u8()? as usize;
        if header_size != HEADER_SIZE || entry_size != ENTRY_SIZE {
            return Err(malformed(
                name,
                format!("record sizes {}/{}", header_size, entry_size),
            ));
        }

        let _reserved = src.read_u8()?;
        let entry_count = src.read_u32::<BigEndian>()?;
        let names_len = src.read_u32::<BigEndian>()?;

        Ok(Header {
            entry_count,
            names_len,
        })
    }

    pub fn write<W: Write>(&self, dst: &mut W) -> Result<()> {
        dst.write_all(&MAGIC)?;
        dst.write_u8(VERSION)?;
        dst.write_u8(HEADER_SIZE as u8)?;
        dst.write_u8(ENTRY_SIZE as u8)?;
        dst.write_u8(0)?;
        dst.write_u32::<BigEndian>(self.entry_count)?;
        dst.write_u32::<BigEndian>(self.names_len)?;
        Ok(())
    }

    /// Bytes taken by the header, the index and the names blob.
    pub fn directory_len(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.entry_count) * ENTRY_SIZE as u64 + u64::from(self.names_len)
    }
}

/// One record of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub hash: u32,
    pub nameofs_flags: u32,
    pub offset: u32,
    pub stored_len: u32,
    pub uncompressed_len: u32,
}

impl Entry {
    pub fn read<R: Read>(src: &mut R) -> Result<Entry> {
        Ok(Entry {
            hash: src.read_u32::<BigEndian>()?,
            nameofs_flags: src.read_u32::<BigEndian>()?,
            offset: src.read_u32::<BigEndian>()?,
            stored_len: src.read_u32::<BigEndian>()?,
            uncompressed_len: src.read_u32::<BigEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, dst: &mut W) -> Result<()> {
        dst.write_u32::<BigEndian>(self.hash)?;
        dst.write_u32::<BigEndian>(self.nameofs_flags)?;
        dst.write_u32::<BigEndian>(self.offset)?;
        dst.write_u32::<BigEndian>(self.stored_len)?;
        dst.write_u32::<BigEndian>(self.uncompressed_len)?;
        Ok(())
    }

    #[inline]
    pub fn name_offset(&self) -> usize {
        (self.nameofs_flags & NAME_OFFSET_MASK) as usize
    }

    #[inline]
    pub fn is_deflated(&self) -> bool {
        self.nameofs_flags & FLAG_DEFLATED != 0
    }
}

/// 32-bit FNV-1a of the ASCII-lowercased bytes of `name`.
pub fn hash(name: &str) -> u32 {
    name.bytes().fold(0x811C_9DC5, |hash: u32, b| {
        (hash ^ u32::from(b.to_ascii_lowercase())).wrapping_mul(0x0100_0193)
    })
}

/// Orders names byte-wise after ASCII lowercasing, so that `'_'` sorts
/// before every letter regardless of case.
pub fn compare_names(a: &[u8], b: &[u8]) -> Ordering {
    let a = a.iter().map(u8::to_ascii_lowercase);
    let b = b.iter().map(u8::to_ascii_lowercase);
    a.cmp(b)
}

/// The index order: hash first, names on ties.
pub fn compare_keys(hash_a: u32, name_a: &[u8], hash_b: u32, name_b: &[u8]) -> Ordering {
    hash_a
        .cmp(&hash_b)
        .then_with(|| compare_names(name_a, name_b))
}

/// The NUL-terminated name starting at `offset` of the names blob.
pub fn name_at(names: &[u8], offset: usize) -> Option<&[u8]> {
    let tail = names.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..end])
}

fn malformed(name: &str, reason: String) -> Error {
    Error::Malformed(name.to_owned(), reason)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fnv1a() {
        assert_eq!(hash(""), 0x811C_9DC5);
        assert_eq!(hash("a"), 0xE40C_292C);
        assert_eq!(hash("foobar"), 0xBF9C_F968);
        assert_eq!(hash("FooBar"), hash("foobar"));
    }

    #[test]
    fn names_fold_case() {
        assert_eq!(compare_names(b"ABC", b"abc"), Ordering::Equal);
        assert_eq!(compare_names(b"Z", b"_"), Ordering::Greater);
        assert_eq!(compare_names(b"ab", b"abc"), Ordering::Less);
    }

    #[test]
    fn header() {
        let header = Header {
            entry_count: 3,
            names_len: 40,
        };

        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 3]);
        assert_eq!(Header::read(&mut &bytes[..], "t").unwrap(), header);

        bytes[4] = 2;
        assert!(Header::read(&mut &bytes[..], "t").is_err());
        assert!(Header::read(&mut &bytes[..7], "t").is_err());
    }
}
