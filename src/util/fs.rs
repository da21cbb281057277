//! Case-insensitive file lookup.
//!
//! DBF tables and their memo files often travel between case-insensitive
//! and case-sensitive filesystems, so `PEOPLE.DBF` may sit next to
//! `people.fpt`. [`ifind`] resolves a path component by component, falling
//! back to a case-insensitive directory scan wherever the exact name is
//! missing.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` case-insensitively. Returns `None` if no match exists.
///
/// An existing exact path is returned unchanged. Otherwise each missing
/// component is matched against its directory listing, first match in
/// sorted order wins.
pub fn ifind(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => {
                let exact = join_dir(&resolved, name);
                if exact.exists() {
                    resolved = exact;
                } else {
                    resolved = find_in_dir(&resolved, name)?;
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Some(resolved)
}

/// Resolve `path` with its extension replaced by `ext` (e.g. `"fpt"`).
pub fn ifind_with_extension(path: &Path, ext: &str) -> Option<PathBuf> {
    ifind(&path.with_extension(ext))
}

fn join_dir(dir: &Path, name: &OsStr) -> PathBuf {
    if dir.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        dir.join(name)
    }
}

fn find_in_dir(dir: &Path, name: &OsStr) -> Option<PathBuf> {
    let wanted = name.to_str()?.to_lowercase();
    let listing = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let mut matches: Vec<PathBuf> = std::fs::read_dir(listing)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.to_lowercase() == wanted)
        })
        .map(|entry| join_dir(dir, &entry.file_name()))
        .collect();
    matches.sort();
    matches.into_iter().next()
}
