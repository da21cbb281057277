//! Memo file readers.
//!
//! Memo-bearing fields (`M`, `G`, `P`, `B`) hold a block index into a
//! companion file. Three layouts are supported:
//!
//! | Reader | File | Block layout |
//! |--------|------|--------------|
//! | [`FoxProMemo`] | `.fpt` | `u32 BE type` + `u32 BE length` + data |
//! | [`Db3Memo`] | `.dbt`, version `0x83` | 512-byte blocks, data ends at `0x1A` |
//! | [`Db4Memo`] | other `.dbt` | `u32` reserved + `u32 LE length` + data ending at `0x1F` |
//!
//! Index 0 never refers to a memo. [`NullMemo`] answers every lookup with
//! `None` and stands in when decoding is raw or a missing memo file is
//! tolerated.

use std::io::SeekFrom;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::debug;

use crate::dbf::constants::*;
use crate::dbf::source::ByteSource;
use crate::DbfError;

/// Contents of one memo block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoData {
    /// Text (or untyped dBase) data, decoded with the table encoding for `M` fields.
    Text(Vec<u8>),
    /// Picture, OLE object or other binary payload.
    Binary(Vec<u8>),
}

impl MemoData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MemoData::Text(b) | MemoData::Binary(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            MemoData::Text(b) | MemoData::Binary(b) => b,
        }
    }
}

/// Lookup of memo blocks by index.
pub trait MemoStore {
    /// Fetch the memo at `index`, or `None` for index 0.
    fn fetch(&mut self, index: u32) -> Result<Option<MemoData>, DbfError>;

    /// Release the underlying resource.
    fn close(&mut self) {}
}

/// Memo store for tables without a usable memo file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemo;

impl MemoStore for NullMemo {
    fn fetch(&mut self, _index: u32) -> Result<Option<MemoData>, DbfError> {
        Ok(None)
    }
}

/// FoxPro / Visual FoxPro `.fpt` memo file.
pub struct FoxProMemo {
    source: ByteSource,
    block_size: u64,
}

impl FoxProMemo {
    pub fn open(mut source: ByteSource) -> Result<Self, DbfError> {
        source.seek(SeekFrom::Start(FPT_BLOCK_SIZE_OFFSET))?;
        let buf = source.read(2)?;
        if buf.len() < 2 {
            return Err(DbfError::Format(format!(
                "Memo file {} is too small for a FoxPro header",
                source.describe()
            )));
        }
        let block_size = match u64::from(BigEndian::read_u16(&buf)) {
            0 => FPT_DEFAULT_BLOCK_SIZE,
            n => n,
        };
        debug!(block_size, "opened FoxPro memo file");
        Ok(FoxProMemo { source, block_size })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

impl MemoStore for FoxProMemo {
    fn fetch(&mut self, index: u32) -> Result<Option<MemoData>, DbfError> {
        if index == 0 {
            return Ok(None);
        }
        self.source
            .seek(SeekFrom::Start(u64::from(index) * self.block_size))?;
        let head = self.source.read(MEMO_BLOCK_HEADER_SIZE)?;
        if head.len() < MEMO_BLOCK_HEADER_SIZE {
            return Err(DbfError::Format(format!(
                "EOF reached while reading memo block {} header",
                index
            )));
        }
        let block_type = BigEndian::read_u32(&head[0..4]);
        let length = BigEndian::read_u32(&head[4..8]) as usize;
        let remaining = self.source.remaining()?;
        if length as u64 > remaining {
            return Err(DbfError::Format(format!(
                "Memo block {} claims {} bytes but only {} remain in {}",
                index,
                length,
                remaining,
                self.source.describe()
            )));
        }
        let data = self.source.read(length)?;
        if data.len() != length {
            return Err(DbfError::Format(format!(
                "EOF reached while reading memo block {}: {} of {} bytes",
                index,
                data.len(),
                length
            )));
        }
        Ok(Some(if block_type == FPT_TYPE_TEXT {
            MemoData::Text(data)
        } else {
            MemoData::Binary(data)
        }))
    }

    fn close(&mut self) {
        self.source.close();
    }
}

/// dBase III `.dbt` memo file.
pub struct Db3Memo {
    source: ByteSource,
}

impl Db3Memo {
    pub fn open(source: ByteSource) -> Self {
        Db3Memo { source }
    }
}

impl MemoStore for Db3Memo {
    fn fetch(&mut self, index: u32) -> Result<Option<MemoData>, DbfError> {
        if index == 0 {
            return Ok(None);
        }
        self.source
            .seek(SeekFrom::Start(u64::from(index) * DB3_MEMO_BLOCK_SIZE))?;

        let mut data = Vec::new();
        loop {
            let chunk = self.source.read(DB3_MEMO_BLOCK_SIZE as usize)?;
            if chunk.is_empty() {
                break;
            }
            let searched = data.len();
            data.extend_from_slice(&chunk);
            if let Some(end) = data[searched..]
                .iter()
                .position(|&b| b == DB3_MEMO_TERMINATOR)
            {
                data.truncate(searched + end);
                break;
            }
        }
        Ok(Some(MemoData::Text(data)))
    }

    fn close(&mut self) {
        self.source.close();
    }
}

/// dBase IV `.dbt` memo file.
pub struct Db4Memo {
    source: ByteSource,
    block_size: u64,
}

impl Db4Memo {
    pub fn open(mut source: ByteSource) -> Result<Self, DbfError> {
        source.seek(SeekFrom::Start(DB4_MEMO_BLOCK_SIZE_OFFSET))?;
        let buf = source.read(2)?;
        let block_size = match buf.len() {
            2 => u64::from(LittleEndian::read_u16(&buf)),
            _ => 0,
        };
        let block_size = if block_size == 0 {
            DB4_MEMO_DEFAULT_BLOCK_SIZE
        } else {
            block_size
        };
        debug!(block_size, "opened dBase IV memo file");
        Ok(Db4Memo { source, block_size })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

impl MemoStore for Db4Memo {
    fn fetch(&mut self, index: u32) -> Result<Option<MemoData>, DbfError> {
        if index == 0 {
            return Ok(None);
        }
        self.source
            .seek(SeekFrom::Start(u64::from(index) * self.block_size))?;
        let head = self.source.read(MEMO_BLOCK_HEADER_SIZE)?;
        if head.len() < MEMO_BLOCK_HEADER_SIZE {
            return Ok(Some(MemoData::Text(Vec::new())));
        }
        let length = LittleEndian::read_u32(&head[4..8]) as usize;
        let mut data = self.source.read(length)?;
        if let Some(end) = data.iter().position(|&b| b == DB4_MEMO_TERMINATOR) {
            data.truncate(end);
        }
        Ok(Some(MemoData::Text(data)))
    }

    fn close(&mut self) {
        self.source.close();
    }
}

/// Pick the reader for a memo file by its name and the table version byte.
pub fn open_memo(
    source: ByteSource,
    file_name: &str,
    dbversion: u8,
) -> Result<Box<dyn MemoStore>, DbfError> {
    if file_name.to_ascii_lowercase().ends_with(".fpt") {
        Ok(Box::new(FoxProMemo::open(source)?))
    } else if dbversion == 0x83 {
        Ok(Box::new(Db3Memo::open(source)))
    } else {
        Ok(Box::new(Db4Memo::open(source)?))
    }
}

/// Memo file extensions, in lookup order.
pub const MEMO_EXTENSIONS: [&str; 4] = ["fpt", "FPT", "dbt", "DBT"];

/// Candidate memo member names for a table member name, in lookup order.
pub fn memo_candidates(table_name: &str) -> Vec<String> {
    let stem = match table_name.rfind('.') {
        Some(dot) if !table_name[dot..].contains(['/', '\\']) => &table_name[..dot],
        _ => table_name,
    };
    MEMO_EXTENSIONS
        .iter()
        .map(|ext| format!("{}.{}", stem, ext))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fpt_image(block_size: u16, blocks: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let bs = block_size as usize;
        let mut buf = vec![0u8; bs.max(512)];
        BigEndian::write_u16(&mut buf[6..8], block_size);
        for (index, block_type, data) in blocks {
            let start = *index as usize * bs;
            let end = start + MEMO_BLOCK_HEADER_SIZE + data.len();
            if buf.len() < end {
                buf.resize(end, 0);
            }
            BigEndian::write_u32(&mut buf[start..], *block_type);
            BigEndian::write_u32(&mut buf[start + 4..], data.len() as u32);
            buf[start + 8..end].copy_from_slice(data);
        }
        buf
    }

    #[test]
    fn test_null_memo() {
        let mut m = NullMemo;
        assert_eq!(m.fetch(5).unwrap(), None);
    }

    #[test]
    fn test_foxpro_text_and_binary() {
        let img = fpt_image(64, &[(8, 1, &b"hello memo"[..]), (9, 2, &[1u8, 2, 3][..])]);
        let mut m = FoxProMemo::open(ByteSource::from_bytes(img)).unwrap();
        assert_eq!(m.block_size(), 64);
        assert_eq!(m.fetch(0).unwrap(), None);
        assert_eq!(
            m.fetch(8).unwrap(),
            Some(MemoData::Text(b"hello memo".to_vec()))
        );
        assert_eq!(m.fetch(9).unwrap(), Some(MemoData::Binary(vec![1, 2, 3])));
    }

    #[test]
    fn test_foxpro_truncated_block() {
        let mut img = fpt_image(64, &[(8, 1, &b"abcdef"[..])]);
        img.truncate(8 * 64 + 10);
        let mut m = FoxProMemo::open(ByteSource::from_bytes(img)).unwrap();
        assert!(matches!(m.fetch(8), Err(DbfError::Format(_))));
    }

    #[test]
    fn test_foxpro_corrupt_length_is_format_error() {
        let mut img = fpt_image(64, &[(8, 1, &b"abcdef"[..])]);
        BigEndian::write_u32(&mut img[8 * 64 + 4..], 0xFFFF_FFF0);
        let mut m = FoxProMemo::open(ByteSource::from_bytes(img)).unwrap();
        match m.fetch(8) {
            Err(DbfError::Format(msg)) => assert!(msg.contains("4294967280")),
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn test_db4_corrupt_length_reads_what_exists() {
        let mut img = vec![0u8; 512];
        let start = 512;
        img.resize(start + 8, 0);
        LittleEndian::write_u32(&mut img[start + 4..], 0xFFFF_FFF0);
        img.extend_from_slice(b"short\x1f");
        let mut m = Db4Memo::open(ByteSource::from_bytes(img)).unwrap();
        assert_eq!(m.fetch(1).unwrap(), Some(MemoData::Text(b"short".to_vec())));
    }

    #[test]
    fn test_db3_memo_terminator() {
        let mut img = vec![0u8; 512 * 3];
        img[512..517].copy_from_slice(b"first");
        img[517] = 0x1A;
        img[518] = 0x1A;
        // spans a block boundary
        for b in img[1024..].iter_mut() {
            *b = b'x';
        }
        img.extend_from_slice(b"yz\x1a");
        let mut m = Db3Memo::open(ByteSource::from_bytes(img));
        assert_eq!(m.fetch(1).unwrap(), Some(MemoData::Text(b"first".to_vec())));
        let long = m.fetch(2).unwrap().unwrap().into_bytes();
        assert_eq!(long.len(), 514);
        assert!(long.ends_with(b"xyz"));
    }

    #[test]
    fn test_db3_memo_without_terminator_reads_to_eof() {
        let mut img = vec![0u8; 512];
        img.extend_from_slice(b"tail");
        let mut m = Db3Memo::open(ByteSource::from_bytes(img));
        assert_eq!(m.fetch(1).unwrap(), Some(MemoData::Text(b"tail".to_vec())));
    }

    #[test]
    fn test_db4_memo() {
        let mut img = vec![0u8; 1024];
        LittleEndian::write_u16(&mut img[20..22], 256);
        let start = 2 * 256;
        LittleEndian::write_u32(&mut img[start + 4..], 8 + 5);
        img[start + 8..start + 13].copy_from_slice(b"notes");
        img[start + 13] = 0x1F;
        img[start + 14] = 0x1F;
        let mut m = Db4Memo::open(ByteSource::from_bytes(img)).unwrap();
        assert_eq!(m.block_size(), 256);
        assert_eq!(m.fetch(2).unwrap(), Some(MemoData::Text(b"notes".to_vec())));
    }

    #[test]
    fn test_db4_zero_block_size_defaults() {
        let m = Db4Memo::open(ByteSource::from_bytes(vec![0u8; 64])).unwrap();
        assert_eq!(m.block_size(), 512);
    }

    #[test]
    fn test_open_memo_dispatch() {
        let img = fpt_image(64, &[(8, 1, &b"x"[..])]);
        let mut m = open_memo(ByteSource::from_bytes(img), "T.FPT", 0x30).unwrap();
        assert_eq!(m.fetch(8).unwrap(), Some(MemoData::Text(b"x".to_vec())));

        let mut img = vec![0u8; 512];
        img.extend_from_slice(b"db3\x1a");
        let mut m = open_memo(ByteSource::from_bytes(img), "t.dbt", 0x83).unwrap();
        assert_eq!(m.fetch(1).unwrap(), Some(MemoData::Text(b"db3".to_vec())));
    }

    #[test]
    fn test_memo_candidates() {
        assert_eq!(
            memo_candidates("data/people.dbf"),
            vec![
                "data/people.fpt",
                "data/people.FPT",
                "data/people.dbt",
                "data/people.DBT"
            ]
        );
        assert_eq!(memo_candidates("noext")[0], "noext.fpt");
        assert_eq!(memo_candidates("dir.v2/table")[0], "dir.v2/table.fpt");
    }
}
