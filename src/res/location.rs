use std::path::{Path, PathBuf};

/// Marks a name that bypasses packages and the path prefix.
pub const HOST_MARKER: &str = "host:";

/// Strips `prefix` from the front of `name`, ignoring ASCII case.
pub fn strip_prefix_ci<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let len = prefix.len();
    if name.len() >= len
        && name.is_char_boundary(len)
        && name[..len].eq_ignore_ascii_case(prefix)
    {
        Some(&name[len..])
    } else {
        None
    }
}

/// Maps a resource name that no package claims to a host path.
///
/// `host:PATH` uses `PATH` verbatim, `/PATH` is absolute, and anything else
/// is relative to `prefix`.
pub fn host_path(prefix: &Path, name: &str) -> PathBuf {
    if let Some(rest) = strip_prefix_ci(name, HOST_MARKER) {
        PathBuf::from(rest)
    } else if name.starts_with('/') {
        PathBuf::from(name)
    } else {
        prefix.join(name)
    }
}
