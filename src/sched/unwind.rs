use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Runs `func`, turning a panic into an `Err` carrying its payload. Jobs are
/// treated as exception safe: whatever they touched is discarded with them.
pub fn halt_unwinding<F, R>(func: F) -> thread::Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(func))
}

/// Best-effort text of a panic payload, for logging.
pub fn describe(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
