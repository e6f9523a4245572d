//! Worker threads for jobs that must not run on the client thread: async
//! reads and background decompression.

pub mod latch;
pub mod scheduler;
mod unwind;

pub mod prelude {
    pub use super::latch::{Latch, LockLatch, SpinLatch};
    pub use super::scheduler::{WorkId, WorkerPool};
}
