//! DBF table header parsing.
//!
//! Every DBF file begins with a 32-byte little-endian header ([`DbfHeader`])
//! holding the dialect byte, last-update date, record count, and the header
//! and record lengths that drive every later seek. The header length is
//! taken as-is: some dialects pad the area after the field descriptors, so
//! the row area always starts at `headerlen`, never at the end of the
//! parsed descriptors.

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use serde::Serialize;

use crate::dbf::constants::*;
use crate::dbf::source::ByteSource;
use crate::DbfError;

/// Parsed table header (32 bytes at offset 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbfHeader {
    /// Version / dialect byte. Byte 0.
    pub dbversion: u8,
    /// Two-digit year of last update. Byte 1.
    pub year: u8,
    /// Month of last update. Byte 2.
    pub month: u8,
    /// Day of last update. Byte 3.
    pub day: u8,
    /// Number of records, active and deleted. Bytes 4-7.
    pub numrecords: u32,
    /// Offset of the first record. Bytes 8-9.
    pub headerlen: u16,
    /// Length of one record including its marker byte. Bytes 10-11.
    pub recordlen: u16,
    pub reserved1: u16,
    /// Incomplete dBase IV transaction. Byte 14.
    pub incomplete_transaction: u8,
    /// dBase IV encryption flag. Byte 15.
    pub encryption_flag: u8,
    pub free_record_thread: u32,
    pub reserved2: u32,
    pub reserved3: u32,
    /// Production .mdx index present. Byte 28.
    pub mdx_flag: u8,
    /// Language driver / code page byte. Byte 29.
    pub language_driver: u8,
    pub reserved4: u16,
}

impl DbfHeader {
    /// Parse a header from a byte slice of at least [`DBF_HEADER_SIZE`] bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DBF_HEADER_SIZE {
            return None;
        }

        Some(DbfHeader {
            dbversion: data[HDR_DBVERSION],
            year: data[HDR_YEAR],
            month: data[HDR_MONTH],
            day: data[HDR_DAY],
            numrecords: LittleEndian::read_u32(&data[HDR_NUMRECORDS..]),
            headerlen: LittleEndian::read_u16(&data[HDR_HEADERLEN..]),
            recordlen: LittleEndian::read_u16(&data[HDR_RECORDLEN..]),
            reserved1: LittleEndian::read_u16(&data[HDR_RESERVED1..]),
            incomplete_transaction: data[HDR_INCOMPLETE_TRANSACTION],
            encryption_flag: data[HDR_ENCRYPTION_FLAG],
            free_record_thread: LittleEndian::read_u32(&data[HDR_FREE_RECORD_THREAD..]),
            reserved2: LittleEndian::read_u32(&data[HDR_RESERVED2..]),
            reserved3: LittleEndian::read_u32(&data[HDR_RESERVED3..]),
            mdx_flag: data[HDR_MDX_FLAG],
            language_driver: data[HDR_LANGUAGE_DRIVER],
            reserved4: LittleEndian::read_u16(&data[HDR_RESERVED4..]),
        })
    }

    /// Last-update date, or `None` when the stored date is invalid
    /// (commonly all zeros).
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            expand_year(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    /// Human-readable name of the dialect encoded in the version byte.
    pub fn dbversion_name(&self) -> &'static str {
        dbversion_name(self.dbversion)
    }

    /// True for Visual FoxPro tables, which use binary memo pointers.
    pub fn is_visual_foxpro(&self) -> bool {
        matches!(self.dbversion, 0x30..=0x32)
    }
}

/// Read and parse the 32-byte header from the start of `source`.
pub fn read_header(source: &mut ByteSource) -> Result<DbfHeader, DbfError> {
    let buf = source.read(DBF_HEADER_SIZE)?;
    DbfHeader::parse(&buf).ok_or_else(|| {
        DbfError::Format(format!(
            "File too small to be a DBF table: header needs {} bytes, got {}",
            DBF_HEADER_SIZE,
            buf.len()
        ))
    })
}

/// Convert a two-digit year to a four-digit year.
///
/// Values below 80 are in the 2000s, the rest in the 1900s.
pub fn expand_year(year: u8) -> i32 {
    if year < 80 {
        2000 + i32::from(year)
    } else {
        1900 + i32::from(year)
    }
}

/// Map a version byte to the dialect it identifies.
pub fn dbversion_name(dbversion: u8) -> &'static str {
    match dbversion {
        0x02 => "FoxBASE",
        0x03 => "FoxBASE+/dBase III plus, no memo",
        0x04 => "dBase IV, no memo",
        0x05 => "dBase V, no memo",
        0x30 => "Visual FoxPro",
        0x31 => "Visual FoxPro, autoincrement enabled",
        0x32 => "Visual FoxPro, Varchar/Varbinary",
        0x43 => "dBase IV SQL table files, no memo",
        0x63 => "dBase IV SQL system files, no memo",
        0x7B => "dBase IV, with memo",
        0x83 => "FoxBASE+/dBase III plus, with memo",
        0x8B => "dBase IV, with memo",
        0x8E => "dBase IV, with SQL table",
        0xCB => "dBase IV SQL table files, with memo",
        0xE5 => "HiPer-Six format with SMT memo file",
        0xF5 => "FoxPro 2.x (or earlier), with memo",
        0xFB => "FoxBASE",
        _ => "Unknown",
    }
}
