//! # Respak
//!
//! Respak is a resource manager for games. It groups resources by manager,
//! loads them asynchronously from packed archives or the host filesystem,
//! and shares payloads between managers through weak and strong links.
//!
//! ```rust,no_run
//! use respak::prelude::*;
//!
//! let mut res = ResourceSystem::headless(ResourceParams::default()).unwrap();
//! let level = res.create_manager(64).unwrap();
//!
//! let id = res.load_data(level, "host:assets/level.json", 0, MemFlags::empty()).unwrap();
//! let mark = res.mark(level).unwrap();
//! res.wait(level, mark).unwrap();
//!
//! assert!(res.get_data(level, id).is_some());
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

extern crate byteorder;
extern crate crossbeam_deque;
extern crate flate2;
extern crate serde_json;
extern crate smallvec;

#[macro_use]
pub mod utils;
pub mod errors;
pub mod res;
pub mod sched;

pub mod prelude {
    pub use crate::errors::{Error, Result};
    pub use crate::res::prelude::*;
}
