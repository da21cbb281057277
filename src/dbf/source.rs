//! Uniform byte-source handle over files, buffers and zip members.
//!
//! [`ByteSource`] is what the header decoder and the record cursor read
//! from. Every variant supports sequential reads and absolute/relative
//! seeks; [`ByteSource::materialize`] swaps any variant for an in-memory
//! buffer, which is how zip members get cheap random access and how
//! independent cursors can share one table image.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::dbf::archive::ZipMember;
use crate::DbfError;

/// Upper bound on the up-front buffer reservation of [`ByteSource::read`].
const READ_PREALLOC_LIMIT: usize = 64 * 1024;

/// Supertrait combining `Read + Seek` for type-erased readers.
pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A memory-mapped file reader implementing `Read` and `Seek`.
///
/// Wraps a `memmap2::Mmap` with a cursor position. The data stays backed by
/// the OS page cache and only faults in pages that are actually accessed.
#[cfg(feature = "cli")]
pub struct MmapReader {
    mmap: memmap2::Mmap,
    position: u64,
}

#[cfg(feature = "cli")]
impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.mmap.len() as u64;
        if self.position >= len {
            return Ok(0);
        }
        let available = (len - self.position) as usize;
        let to_read = buf.len().min(available);
        let start = self.position as usize;
        buf[..to_read].copy_from_slice(&self.mmap[start..start + to_read]);
        self.position += to_read as u64;
        Ok(to_read)
    }
}

#[cfg(feature = "cli")]
impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.mmap.len() as i64;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
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

/// A byte-addressable resource backing a table or memo file.
pub enum ByteSource {
    /// A plain file read through a buffer.
    File {
        reader: BufReader<File>,
        path: PathBuf,
    },
    /// A fully materialized, shareable buffer.
    Memory(Cursor<Arc<[u8]>>),
    /// A member of a zip container.
    Archive(Box<ZipMember>),
    /// A memory-mapped file.
    #[cfg(feature = "cli")]
    Mapped(MmapReader),
    /// Released; every access fails with [`DbfError::Closed`].
    Closed,
}

fn open_error(path: &Path, e: io::Error) -> DbfError {
    match e.kind() {
        io::ErrorKind::NotFound => {
            DbfError::NotFound(format!("Cannot open {}: {}", path.display(), e))
        }
        _ => DbfError::Io(format!("Cannot open {}: {}", path.display(), e)),
    }
}

impl ByteSource {
    /// Open a file for buffered reading.
    ///
    /// A missing file is [`DbfError::NotFound`]; any other failure is
    /// [`DbfError::Io`].
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, DbfError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        Ok(ByteSource::File {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Open a file using memory-mapped I/O.
    ///
    /// # Safety
    ///
    /// The underlying `mmap` call is marked `unsafe` because the mapped file
    /// must not be modified by another process while the mapping is active.
    #[cfg(feature = "cli")]
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self, DbfError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let mmap = unsafe {
            memmap2::Mmap::map(&file)
                .map_err(|e| DbfError::Io(format!("Cannot mmap {}: {}", path.display(), e)))?
        };
        Ok(ByteSource::Mapped(MmapReader { mmap, position: 0 }))
    }

    /// Wrap an owned buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        ByteSource::Memory(Cursor::new(Arc::from(data)))
    }

    /// Wrap a shared buffer without copying it.
    pub fn from_shared(data: Arc<[u8]>) -> Self {
        ByteSource::Memory(Cursor::new(data))
    }

    /// Stream a zip member.
    pub fn from_zip_member(member: ZipMember) -> Self {
        ByteSource::Archive(Box::new(member))
    }

    /// Short description for log and error messages.
    pub fn describe(&self) -> String {
        match self {
            ByteSource::File { path, .. } => path.display().to_string(),
            ByteSource::Memory(cursor) => format!("<memory, {} bytes>", cursor.get_ref().len()),
            ByteSource::Archive(member) => format!("<zip member {}>", member.name()),
            #[cfg(feature = "cli")]
            ByteSource::Mapped(reader) => format!("<mmap, {} bytes>", reader.mmap.len()),
            ByteSource::Closed => "<closed>".to_string(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ByteSource::Closed)
    }

    /// True when the source is an in-memory buffer.
    pub fn is_materialized(&self) -> bool {
        matches!(self, ByteSource::Memory(_))
    }

    fn ensure_open(&self) -> Result<(), DbfError> {
        if self.is_closed() {
            Err(DbfError::Closed)
        } else {
            Ok(())
        }
    }

    /// Read up to `n` bytes. The result is shorter only at end of resource.
    ///
    /// The buffer grows with the bytes actually read, so a length taken
    /// from a corrupt file never allocates more than the resource holds.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, DbfError> {
        self.ensure_open()?;
        let mut buf = Vec::with_capacity(n.min(READ_PREALLOC_LIMIT));
        let limit = u64::try_from(n).unwrap_or(u64::MAX);
        let result = Read::take(&mut *self, limit).read_to_end(&mut buf);
        if let Err(e) = result {
            return Err(DbfError::Io(format!(
                "Cannot read {}: {}",
                self.describe(),
                e
            )));
        }
        Ok(buf)
    }

    /// Fill as much of `buf` as the resource allows; returns the byte count.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, DbfError> {
        self.ensure_open()?;
        let mut filled = 0;
        while filled < buf.len() {
            match Read::read(self, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DbfError::Io(format!(
                        "Cannot read {}: {}",
                        self.describe(),
                        e
                    )))
                }
            }
        }
        Ok(filled)
    }

    /// Read one byte, or `None` at end of resource.
    pub fn read_byte(&mut self) -> Result<Option<u8>, DbfError> {
        let mut byte = [0u8; 1];
        match self.read_into(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Seek to an absolute or relative position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, DbfError> {
        self.ensure_open()?;
        Seek::seek(self, pos).map_err(|e| {
            DbfError::Io(format!("Cannot seek {} to {:?}: {}", self.describe(), pos, e))
        })
    }

    /// Advance the position by `offset` bytes relative to the current one.
    ///
    /// Buffered files keep their read buffer when the target lies inside it.
    pub fn skip(&mut self, offset: i64) -> Result<(), DbfError> {
        self.ensure_open()?;
        let result = match self {
            ByteSource::File { reader, .. } => reader.seek_relative(offset),
            other => Seek::seek(other, SeekFrom::Current(offset)).map(|_| ()),
        };
        result.map_err(|e| DbfError::Io(format!("Cannot skip {} bytes: {}", offset, e)))
    }

    /// Current read position.
    pub fn position(&mut self) -> Result<u64, DbfError> {
        self.seek(SeekFrom::Current(0))
    }

    /// Read the entire resource from offset 0, leaving the position unchanged.
    pub fn read_all(&mut self) -> Result<Vec<u8>, DbfError> {
        self.ensure_open()?;
        if let ByteSource::Archive(member) = self {
            return member.read_all();
        }
        let position = self.position()?;
        self.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        Read::read_to_end(self, &mut data)
            .map_err(|e| DbfError::Io(format!("Cannot read {}: {}", self.describe(), e)))?;
        self.seek(SeekFrom::Start(position))?;
        Ok(data)
    }

    /// Replace this source with an in-memory copy of its contents.
    ///
    /// Idempotent. The read position is preserved.
    pub fn materialize(&mut self) -> Result<(), DbfError> {
        self.ensure_open()?;
        if self.is_materialized() {
            return Ok(());
        }
        let position = self.position()?;
        let data = self.read_all()?;
        debug!(source = %self.describe(), bytes = data.len(), "materialized source");
        let mut cursor = Cursor::new(Arc::<[u8]>::from(data));
        cursor.set_position(position);
        *self = ByteSource::Memory(cursor);
        Ok(())
    }

    /// An independent source over the same buffer, positioned at 0.
    ///
    /// Only materialized sources can be shared; each share keeps its own
    /// offset, so concurrent readers do not interfere.
    pub fn share(&self) -> Option<ByteSource> {
        match self {
            ByteSource::Memory(cursor) => Some(ByteSource::from_shared(Arc::clone(cursor.get_ref()))),
            _ => None,
        }
    }

    /// Total size of the resource in bytes.
    pub fn len(&mut self) -> Result<u64, DbfError> {
        self.ensure_open()?;
        match self {
            ByteSource::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            ByteSource::Archive(member) => Ok(member.size()),
            #[cfg(feature = "cli")]
            ByteSource::Mapped(reader) => Ok(reader.mmap.len() as u64),
            _ => {
                let position = self.position()?;
                let end = self.seek(SeekFrom::End(0))?;
                self.seek(SeekFrom::Start(position))?;
                Ok(end)
            }
        }
    }

    /// Bytes left between the current position and the end of the resource.
    pub fn remaining(&mut self) -> Result<u64, DbfError> {
        let position = self.position()?;
        Ok(self.len()?.saturating_sub(position))
    }

    pub fn is_empty(&mut self) -> Result<bool, DbfError> {
        Ok(self.len()? == 0)
    }

    /// Release the underlying handle. Idempotent.
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!(source = %self.describe(), "closing source");
            *self = ByteSource::Closed;
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "byte source is closed")
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File { reader, .. } => reader.read(buf),
            ByteSource::Memory(cursor) => cursor.read(buf),
            ByteSource::Archive(member) => member.read(buf),
            #[cfg(feature = "cli")]
            ByteSource::Mapped(reader) => reader.read(buf),
            ByteSource::Closed => Err(closed_error()),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::File { reader, .. } => reader.seek(pos),
            ByteSource::Memory(cursor) => cursor.seek(pos),
            ByteSource::Archive(member) => member.seek(pos),
            #[cfg(feature = "cli")]
            ByteSource::Mapped(reader) => reader.seek(pos),
            ByteSource::Closed => Err(closed_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(data: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().expect("create temp file");
        tmp.write_all(data).expect("write data");
        tmp.flush().expect("flush");
        tmp
    }

    #[test]
    fn test_read_short_at_end() {
        let mut src = ByteSource::from_bytes(vec![1, 2, 3]);
        assert_eq!(src.read(2).unwrap(), vec![1, 2]);
        assert_eq!(src.read(5).unwrap(), vec![3]);
        assert!(src.read(5).unwrap().is_empty());
        assert_eq!(src.read_byte().unwrap(), None);
    }

    #[test]
    fn test_oversized_read_is_bounded_by_resource() {
        let mut src = ByteSource::from_bytes(vec![7; 16]);
        src.seek(SeekFrom::Start(10)).unwrap();
        let data = src.read(0xFFFF_FFF0).unwrap();
        assert_eq!(data, vec![7; 6]);
        assert!(data.capacity() <= READ_PREALLOC_LIMIT);
    }

    #[test]
    fn test_seek_relative_and_absolute() {
        let mut src = ByteSource::from_bytes((0u8..10).collect());
        src.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(src.read_byte().unwrap(), Some(4));
        src.skip(2).unwrap();
        assert_eq!(src.read_byte().unwrap(), Some(7));
        src.skip(-3).unwrap();
        assert_eq!(src.read_byte().unwrap(), Some(5));
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let result = ByteSource::open_file("/nonexistent/dir/table.dbf");
        assert!(matches!(result, Err(DbfError::NotFound(_))));
    }

    #[test]
    fn test_file_source_skip_and_read() {
        let tmp = temp_with(b"0123456789");
        let mut src = ByteSource::open_file(tmp.path()).unwrap();
        assert_eq!(src.read(3).unwrap(), b"012");
        src.skip(4).unwrap();
        assert_eq!(src.read(3).unwrap(), b"789");
        assert_eq!(src.len().unwrap(), 10);
    }

    #[test]
    fn test_materialize_preserves_position() {
        let tmp = temp_with(b"abcdefgh");
        let mut src = ByteSource::open_file(tmp.path()).unwrap();
        src.seek(SeekFrom::Start(3)).unwrap();
        src.materialize().unwrap();
        assert!(src.is_materialized());
        assert_eq!(src.read_byte().unwrap(), Some(b'd'));
    }

    #[test]
    fn test_materialize_is_idempotent_and_restartable() {
        let tmp = temp_with(b"restartable bytes");
        let mut src = ByteSource::open_file(tmp.path()).unwrap();
        src.materialize().unwrap();
        src.materialize().unwrap();

        src.seek(SeekFrom::Start(0)).unwrap();
        let first = src.read(64).unwrap();
        src.seek(SeekFrom::Start(0)).unwrap();
        let second = src.read(64).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, b"restartable bytes");
    }

    #[test]
    fn test_share_gives_independent_offsets() {
        let mut src = ByteSource::from_bytes(b"shared".to_vec());
        src.seek(SeekFrom::Start(3)).unwrap();
        let mut other = src.share().unwrap();
        assert_eq!(other.read(2).unwrap(), b"sh");
        assert_eq!(src.read(3).unwrap(), b"red");
    }

    #[test]
    fn test_file_source_cannot_share() {
        let tmp = temp_with(b"x");
        let src = ByteSource::open_file(tmp.path()).unwrap();
        assert!(src.share().is_none());
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_access() {
        let mut src = ByteSource::from_bytes(vec![1, 2, 3]);
        src.close();
        src.close();
        assert!(src.is_closed());
        assert!(matches!(src.read(1), Err(DbfError::Closed)));
        assert!(matches!(src.seek(SeekFrom::Start(0)), Err(DbfError::Closed)));
        assert!(matches!(src.materialize(), Err(DbfError::Closed)));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_mmap_matches_buffered() {
        let tmp = temp_with(b"mapped contents");
        let mut mapped = ByteSource::open_mmap(tmp.path()).unwrap();
        let mut buffered = ByteSource::open_file(tmp.path()).unwrap();
        assert_eq!(mapped.read(100).unwrap(), buffered.read(100).unwrap());
    }
}
