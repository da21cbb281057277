//! Zip container access and member-name resolution.
//!
//! DBF distributions are often shipped zipped, with the table and its memo
//! file side by side under arbitrary directory nesting and path casing.
//! [`resolve_member`] finds the member matching a logical file name by
//! escalating fuzziness:
//!
//! 1. case-insensitive equality of the normalized relative path,
//! 2. case-insensitive equality of the base name,
//! 3. normalized path ends with `/` + the normalized desired name,
//! 4. a regular-expression search over normalized names.
//!
//! The first rule producing any hit wins. [`ZipMember`] exposes one member
//! as a `Read + Seek` stream over the decompressed bytes.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::dbf::source::ReadSeek;
use crate::DbfError;

/// Decompressed bytes cached per window when streaming a member.
const MEMBER_WINDOW: u64 = 64 * 1024;

/// Which resolver rule matched a member name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchRule {
    ExactPath,
    Basename,
    Suffix,
    Pattern,
}

/// Normalize a member path: `/` separators, no `.` or empty components,
/// `..` collapsed, lower-cased.
pub fn normalize_member_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in replaced.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/").to_lowercase()
}

fn basename(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Resolve `desired` against the member names of a container.
///
/// `pattern` is applied last, to normalized (lower-cased) names.
pub fn resolve_member(
    names: &[String],
    desired: &str,
    pattern: Option<&Regex>,
) -> Option<(String, MatchRule)> {
    let wanted = normalize_member_path(desired);
    let normalized: Vec<String> = names.iter().map(|n| normalize_member_path(n)).collect();

    if !wanted.is_empty() {
        let wanted_base = basename(&wanted).to_string();
        let wanted_suffix = format!("/{}", wanted);

        if let Some(found) = first_match(names, &normalized, MatchRule::ExactPath, |norm| {
            norm == wanted
        }) {
            return Some(found);
        }
        if let Some(found) = first_match(names, &normalized, MatchRule::Basename, |norm| {
            basename(norm) == wanted_base
        }) {
            return Some(found);
        }
        if let Some(found) = first_match(names, &normalized, MatchRule::Suffix, |norm| {
            format!("/{}", norm).ends_with(&wanted_suffix)
        }) {
            return Some(found);
        }
    }

    pattern.and_then(|re| {
        first_match(names, &normalized, MatchRule::Pattern, |norm| re.is_match(norm))
    })
}

fn first_match<F>(
    names: &[String],
    normalized: &[String],
    rule: MatchRule,
    hit: F,
) -> Option<(String, MatchRule)>
where
    F: Fn(&str) -> bool,
{
    names
        .iter()
        .zip(normalized.iter())
        .find(|(_, norm)| hit(norm.as_str()))
        .map(|(name, _)| (name.clone(), rule))
}

/// Where a zip container's bytes come from.
#[derive(Debug, Clone)]
pub enum ArchiveOrigin {
    /// A zip file on disk.
    Path(PathBuf),
    /// A zip image held in memory.
    Bytes(Arc<[u8]>),
}

impl ArchiveOrigin {
    fn open_reader(&self) -> Result<Box<dyn ReadSeek>, DbfError> {
        match self {
            ArchiveOrigin::Path(path) => {
                let file = File::open(path).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => {
                        DbfError::NotFound(format!("Cannot open {}: {}", path.display(), e))
                    }
                    _ => DbfError::Io(format!("Cannot open {}: {}", path.display(), e)),
                })?;
                Ok(Box::new(file))
            }
            ArchiveOrigin::Bytes(data) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
        }
    }

    fn describe(&self) -> String {
        match self {
            ArchiveOrigin::Path(path) => path.display().to_string(),
            ArchiveOrigin::Bytes(data) => format!("<in-memory zip, {} bytes>", data.len()),
        }
    }
}

/// An open zip container.
pub struct ZipPackage {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    origin: ArchiveOrigin,
}

impl ZipPackage {
    /// Open the container and read its central directory.
    pub fn open(origin: ArchiveOrigin) -> Result<Self, DbfError> {
        let reader = origin.open_reader()?;
        let archive = ZipArchive::new(reader).map_err(|e| {
            DbfError::Format(format!("Invalid zip archive {}: {}", origin.describe(), e))
        })?;
        Ok(ZipPackage { archive, origin })
    }

    pub fn origin(&self) -> &ArchiveOrigin {
        &self.origin
    }

    /// Member names in central-directory order.
    pub fn names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Resolve a logical name to a member name using [`resolve_member`].
    pub fn resolve(&self, desired: &str, pattern: Option<&Regex>) -> Option<String> {
        let names = self.names();
        resolve_member(&names, desired, pattern).map(|(name, rule)| {
            debug!(
                archive = %self.origin.describe(),
                desired,
                member = %name,
                ?rule,
                "resolved archive member"
            );
            name
        })
    }

    /// Read a whole member into memory.
    pub fn read_member(&mut self, name: &str) -> Result<Vec<u8>, DbfError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| member_error(&self.origin, name, e))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| DbfError::Io(format!("Cannot read member {}: {}", name, e)))?;
        Ok(data)
    }

    /// Turn the container into a seekable stream over one member.
    pub fn into_member(mut self, name: &str) -> Result<ZipMember, DbfError> {
        let size = self
            .archive
            .by_name(name)
            .map_err(|e| member_error(&self.origin, name, e))?
            .size();
        Ok(ZipMember {
            package: self,
            name: name.to_string(),
            size,
            position: 0,
            window: Vec::new(),
            window_start: 0,
        })
    }
}

fn member_error(origin: &ArchiveOrigin, name: &str, err: ZipError) -> DbfError {
    match err {
        ZipError::FileNotFound => DbfError::NotFound(format!(
            "Can't find member {} in archive {}",
            name,
            origin.describe()
        )),
        other => DbfError::Format(format!(
            "Cannot open member {} in archive {}: {}",
            name,
            origin.describe(),
            other
        )),
    }
}

/// A single zip member exposed as `Read + Seek`.
///
/// Compressed members cannot seek natively, so the decompressed stream is
/// cached one window at a time. Seeking outside the current window
/// re-inflates the member from its start.
pub struct ZipMember {
    package: ZipPackage,
    name: String,
    size: u64,
    position: u64,
    window: Vec<u8>,
    window_start: u64,
}

impl ZipMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decompressed size of the member.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Inflate the whole member, independent of the stream position.
    pub fn read_all(&mut self) -> Result<Vec<u8>, DbfError> {
        let name = self.name.clone();
        self.package.read_member(&name)
    }

    fn fill_window(&mut self) -> io::Result<()> {
        let start = self.position - self.position % MEMBER_WINDOW;
        let mut entry = self
            .package
            .archive
            .by_name(&self.name)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        io::copy(&mut (&mut entry).take(start), &mut io::sink())?;
        self.window.clear();
        (&mut entry).take(MEMBER_WINDOW).read_to_end(&mut self.window)?;
        self.window_start = start;
        Ok(())
    }

    fn window_contains(&self, pos: u64) -> bool {
        pos >= self.window_start && pos < self.window_start + self.window.len() as u64
    }
}

impl Read for ZipMember {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }
        if !self.window_contains(self.position) {
            self.fill_window()?;
            if !self.window_contains(self.position) {
                return Ok(0);
            }
        }
        let offset = (self.position - self.window_start) as usize;
        let n = buf.len().min(self.window.len() - offset);
        buf[..n].copy_from_slice(&self.window[offset..offset + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ZipMember {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.size as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}
