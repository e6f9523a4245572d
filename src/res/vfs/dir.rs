use std::fs;
use std::path::{Path, PathBuf};
use std::vec;

use crate::errors::*;

/// Directories nested deeper than this below the listed one are skipped.
/// Symlink loops would otherwise be followed forever.
pub const MAX_LIST_DEPTH: usize = 16;

struct Level {
    path: PathBuf,
    prefix: String,
    entries: vec::IntoIter<(String, bool)>,
}

/// Lazily enumerates the files of a host directory, optionally descending
/// into subdirectories. Names are relative to the listed directory, with
/// `/` between components.
pub struct HostWalker {
    stack: Vec<Level>,
    recursive: bool,
}

impl HostWalker {
    pub fn new<T: AsRef<Path>>(root: T, recursive: bool) -> Result<Self> {
        let root = root.as_ref();
        let entries = read_level(root)?;
        Ok(HostWalker {
            stack: vec![Level {
                path: root.to_owned(),
                prefix: String::new(),
                entries,
            }],
            recursive,
        })
    }
}

impl Iterator for HostWalker {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let next = {
                let level = self.stack.last_mut()?;
                level.entries.next().map(|(name, is_dir)| {
                    let path = level.path.join(&name);
                    (path, format!("{}{}", level.prefix, name), is_dir)
                })
            };

            match next {
                None => {
                    self.stack.pop();
                }
                Some((_, name, false)) => return Some(name),
                Some((path, name, true)) => {
                    if !self.recursive {
                        continue;
                    }

                    if self.stack.len() > MAX_LIST_DEPTH {
                        warn!("[HostWalker] {:?} is nested too deep, skipped.", path);
                        continue;
                    }

                    match read_level(&path) {
                        Ok(entries) => self.stack.push(Level {
                            path,
                            prefix: format!("{}/", name),
                            entries,
                        }),
                        Err(err) => warn!("[HostWalker] can not list {:?}: {}", path, err),
                    }
                }
            }
        }
    }
}

fn read_level(path: &Path) -> Result<vec::IntoIter<(String, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, entry.path().is_dir())),
            Err(name) => warn!("[HostWalker] skips non UTF-8 name {:?}.", name),
        }
    }

    entries.sort();
    Ok(entries.into_iter())
}
