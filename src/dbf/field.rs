//! Field descriptor parsing and post-processing.
//!
//! The descriptor block follows the table header: a run of 32-byte
//! [`RawFieldDescriptor`]s ended by `\r`, `\n` or end of resource. The
//! terminator is consumed. [`FieldRegistry`] turns raw descriptors into
//! [`FieldDescriptor`]s: it restores 16-bit character lengths, decodes
//! names with the table encoding, applies the optional name transforms,
//! and renames duplicates with `.1`, `.2`, ... suffixes in order of
//! appearance.

use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::dbf::codepage::TextDecoder;
use crate::dbf::constants::*;
use crate::dbf::source::ByteSource;
use crate::dbf::value::FieldParser;
use crate::DbfError;

/// A field descriptor exactly as stored on disk (32 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFieldDescriptor {
    /// NUL-terminated name slot. Bytes 0-10.
    pub name: [u8; FIELD_NAME_SIZE],
    /// Type tag. Byte 11.
    pub field_type: u8,
    /// Field address in memory (dBase) or offset in record (FoxPro). Bytes 12-15.
    pub address: u32,
    /// Length in bytes (low byte for long character fields). Byte 16.
    pub length: u8,
    /// Decimal places, or the length high byte for character fields. Byte 17.
    pub decimal_count: u8,
    pub reserved1: u16,
    pub workarea_id: u8,
    pub reserved2: u8,
    pub reserved3: u8,
    pub set_fields_flag: u8,
    pub reserved4: [u8; 7],
    pub index_field_flag: u8,
}

impl RawFieldDescriptor {
    /// Parse a descriptor from at least [`FIELD_DESCRIPTOR_SIZE`] bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < FIELD_DESCRIPTOR_SIZE {
            return None;
        }

        let mut name = [0u8; FIELD_NAME_SIZE];
        name.copy_from_slice(&data[FLD_NAME..FLD_NAME + FIELD_NAME_SIZE]);
        let mut reserved4 = [0u8; 7];
        reserved4.copy_from_slice(&data[FLD_RESERVED4..FLD_RESERVED4 + 7]);

        Some(RawFieldDescriptor {
            name,
            field_type: data[FLD_TYPE],
            address: LittleEndian::read_u32(&data[FLD_ADDRESS..]),
            length: data[FLD_LENGTH],
            decimal_count: data[FLD_DECIMAL_COUNT],
            reserved1: LittleEndian::read_u16(&data[FLD_RESERVED1..]),
            workarea_id: data[FLD_WORKAREA_ID],
            reserved2: data[FLD_RESERVED2],
            reserved3: data[FLD_RESERVED3],
            set_fields_flag: data[FLD_SET_FIELDS_FLAG],
            reserved4,
            index_field_flag: data[FLD_INDEX_FIELD_FLAG],
        })
    }

    /// The significant part of the name: everything before the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FIELD_NAME_SIZE);
        &self.name[..end]
    }
}

/// Read descriptors until `\r`, `\n` or end of resource.
///
/// The source must be positioned right after the table header.
pub fn read_field_descriptors(source: &mut ByteSource) -> Result<Vec<RawFieldDescriptor>, DbfError> {
    let mut fields = Vec::new();
    let mut buf = [0u8; FIELD_DESCRIPTOR_SIZE];

    loop {
        let first = match source.read_byte()? {
            None | Some(FIELD_TERMINATOR_CR) | Some(FIELD_TERMINATOR_LF) => break,
            Some(b) => b,
        };
        buf[0] = first;
        let got = source.read_into(&mut buf[1..])?;
        if got < FIELD_DESCRIPTOR_SIZE - 1 {
            return Err(DbfError::Format(format!(
                "Truncated field descriptor #{}: {} of {} bytes",
                fields.len() + 1,
                got + 1,
                FIELD_DESCRIPTOR_SIZE
            )));
        }
        // parse() only fails on short input, which was checked above
        if let Some(raw) = RawFieldDescriptor::parse(&buf) {
            fields.push(raw);
        }
    }

    Ok(fields)
}

/// A processed field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Display name (possibly lower-cased, combined or renamed).
    pub name: String,
    /// Name as decoded from disk.
    pub name_real: String,
    /// One-character type tag.
    pub field_type: char,
    pub address: u32,
    /// Effective length in bytes.
    pub length: usize,
    pub decimal_count: u8,
    /// Byte offset of the field within a record, after the marker byte.
    pub offset: usize,
    pub workarea_id: u8,
    pub set_fields_flag: u8,
    pub index_field_flag: u8,
}

impl FieldDescriptor {
    /// True for types whose values live in the memo file.
    pub fn is_memo(&self) -> bool {
        MEMO_FIELD_TYPES.contains(&self.field_type)
    }

    /// True when `column` names this field by display or on-disk name.
    pub fn matches(&self, column: &str) -> bool {
        self.name == column || self.name_real == column
    }
}

/// Name presentation options applied while registering fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameOptions {
    /// Lower-case display names.
    pub lowernames: bool,
    /// Use `name,type,length,decimal_count` as the display name.
    pub combined_names: bool,
    /// Suffix repeated names with `.1`, `.2`, ...
    pub rename_duplicates: bool,
}

impl Default for NameOptions {
    fn default() -> Self {
        NameOptions {
            lowernames: false,
            combined_names: false,
            rename_duplicates: true,
        }
    }
}

/// Builds [`FieldDescriptor`]s for one table.
///
/// Renaming state lives here, so it is scoped to a single header decode.
pub struct FieldRegistry<'a> {
    options: NameOptions,
    decoder: &'a TextDecoder,
    seen: HashSet<String>,
    next_offset: usize,
}

impl<'a> FieldRegistry<'a> {
    pub fn new(options: NameOptions, decoder: &'a TextDecoder) -> Self {
        FieldRegistry {
            options,
            decoder,
            seen: HashSet::new(),
            next_offset: 0,
        }
    }

    /// Process one raw descriptor in on-disk order.
    pub fn register(&mut self, raw: &RawFieldDescriptor) -> Result<FieldDescriptor, DbfError> {
        let field_type = char::from(raw.field_type);
        let mut length = usize::from(raw.length);
        let mut decimal_count = raw.decimal_count;

        // Character fields longer than 255 bytes keep the high byte in decimal_count.
        if field_type == 'C' {
            length |= usize::from(decimal_count) << 8;
            decimal_count = 0;
        }

        let name_real = self.decoder.decode(raw.name_bytes())?;
        let mut name = name_real.clone();
        if self.options.combined_names {
            name = format!("{},{},{},{}", name, field_type, length, decimal_count);
        }
        if self.options.lowernames {
            name = name.to_lowercase();
        }
        if self.options.rename_duplicates {
            if self.seen.contains(&name) {
                let mut i = 1;
                while self.seen.contains(&format!("{}.{}", name, i)) {
                    i += 1;
                }
                name = format!("{}.{}", name, i);
            }
            self.seen.insert(name.clone());
        }

        let offset = self.next_offset;
        self.next_offset += length;

        Ok(FieldDescriptor {
            name,
            name_real,
            field_type,
            address: raw.address,
            length,
            decimal_count,
            offset,
            workarea_id: raw.workarea_id,
            set_fields_flag: raw.set_fields_flag,
            index_field_flag: raw.index_field_flag,
        })
    }

    /// Process all descriptors, preserving their order.
    pub fn build(mut self, raws: &[RawFieldDescriptor]) -> Result<Vec<FieldDescriptor>, DbfError> {
        raws.iter().map(|raw| self.register(raw)).collect()
    }
}

/// Check every field against fixed-length rules and the parser's capabilities.
pub fn validate_fields(fields: &[FieldDescriptor], parser: &dyn FieldParser) -> Result<(), DbfError> {
    for field in fields {
        match field.field_type {
            'I' if field.length != 4 => {
                return Err(DbfError::Format(format!(
                    "Field type I must have length 4 (was {}) in field {}",
                    field.length, field.name
                )));
            }
            'L' if field.length != 1 => {
                return Err(DbfError::Format(format!(
                    "Field type L must have length 1 (was {}) in field {}",
                    field.length, field.name
                )));
            }
            t if !parser.supports(t) => {
                return Err(DbfError::Format(format!(
                    "Unknown field type: {:?} in field {}",
                    t, field.name
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
