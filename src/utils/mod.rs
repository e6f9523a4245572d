//! Generational handles and the pools built on top of them.

#[macro_use]
pub mod handle;
pub mod handle_pool;
pub mod object_pool;

pub mod prelude {
    pub use super::handle::{Handle, HandleIndex, HandleLike};
    pub use super::handle_pool::HandlePool;
    pub use super::object_pool::ObjectPool;
}
