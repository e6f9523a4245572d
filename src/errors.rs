//! Errors reported by the resource system.

use std::io;

use crate::res::slot::SlotKind;
use crate::res::ManagerHandle;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{}", _0)]
    IO(#[cause] io::Error),
    #[fail(display = "Manager {} is not alive.", _0)]
    InvalidManager(ManagerHandle),
    #[fail(display = "Resource id {} is not in use.", _0)]
    InvalidResource(u32),
    #[fail(display = "Resource id {} holds {:?}, expected {:?}.", id, found, expected)]
    WrongKind {
        id: u32,
        found: SlotKind,
        expected: SlotKind,
    },
    #[fail(display = "Resource id {} is a stale link.", _0)]
    StaleLink(u32),
    #[fail(display = "{}", _0)]
    InvalidArgument(String),
    #[fail(display = "Resource {} not found.", _0)]
    NotFound(String),
    #[fail(display = "Malformed package {}: {}.", _0, _1)]
    Malformed(String, String),
    #[fail(display = "A package with prefix {:?} is registered already.", _0)]
    PackageExists(String),
    #[fail(display = "Out of memory.")]
    OutOfMemory,
    #[fail(display = "Worker pool {} has {} jobs outstanding.", _0, _1)]
    PoolExhausted(String, usize),
    #[fail(display = "Link ring through {} exceeds {} entries.", _0, _1)]
    RingOverflow(u32, usize),
    #[fail(display = "Decompression failed: {}.", _0)]
    Decompression(String),
    #[fail(display = "{}", _0)]
    Asset(failure::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<failure::Error> for Error {
    fn from(err: failure::Error) -> Self {
        Error::Asset(err)
    }
}

impl From<::std::collections::TryReserveError> for Error {
    fn from(_: ::std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}
