//! The `ResourceSystem` hands out resources grouped by manager, loads them
//! asynchronously from packages or the host filesystem, and shares them
//! between managers through links.
//!
//! # Manager
//!
//! A manager is a table of slots. Each slot is identified by a small
//! positive `ResourceId` and holds one resource: a data buffer, a texture,
//! a font, a sound or a readable file. Ids are reused lowest first once a
//! slot is freed, and tables grow by a fixed increment when they run out of
//! room.
//!
//! Every slot is stamped with the current _mark_ of its manager. Calling
//! `mark` starts a new generation and returns it; `sync` and `wait` only
//! look at slots older than the mark they are given. A client can wait for
//! the loads of a level without waiting for what it starts streaming
//! afterwards:
//!
//! ```rust,ignore
//! let id = res.load_texture(level, "pak/textures/crate.png", true)?;
//! let mark = res.mark(level)?;
//! res.load_sound(level, "pak/music/theme.ogg")?;
//! res.wait(level, mark)?;
//! ```
//!
//! # Links
//!
//! A resource can be linked into another manager. Every slot sharing the
//! payload belongs to one ring; the payload is destroyed when the last
//! strong member is freed. Weak members never keep a payload alive. Once the
//! last strong member is gone they turn _stale_ and resolve to nothing.
//!
//! # Names
//!
//! Names are resolved against the registered packages first. A package
//! answers every name that starts with its prefix, case-insensitively. Other
//! names are read from the host filesystem below the configured path prefix,
//! or verbatim when prefixed with `host:`.
//!
//! # Loading
//!
//! Loads run through a fixed number of async read slots. Compressed package
//! members are inflated on the client thread once read, or streamed on a
//! background worker pool when they are large enough. `sync` polls without
//! blocking, `wait` blocks until every load of a generation is done.

pub mod assets;
pub mod buffer;
pub mod file;
pub mod headless;
pub mod link;
pub mod load;
pub mod location;
pub mod package;
pub mod params;
pub mod request;
pub mod slot;
pub mod state;
pub mod stream;
pub mod system;
pub mod table;
pub mod vfs;

pub use self::load::LoadHandle;
pub use self::system::ResourceSystem;
pub use self::table::ManagerHandle;

pub mod prelude {
    pub use super::assets::{
        Asset, AssetFactory, DataBlob, FileSlice, FontHandle, MemFlags, SoundHandle, TextureHandle,
    };
    pub use super::buffer::AlignedBuf;
    pub use super::file::FileHandle;
    pub use super::headless::{HeadlessFactory, HeadlessStats};
    pub use super::package::prelude::*;
    pub use super::params::{BackgroundParams, ResourceParams, WaitOrder};
    pub use super::request::{AsyncIo, ThreadedIo};
    pub use super::slot::{Mark, ResourceId, SlotKind};
    pub use super::state::ResourceState;
    pub use super::vfs::FileList;
    pub use super::{ManagerHandle, ResourceSystem};
}
