//! Field value decoding.
//!
//! The record cursor hands each field's raw bytes to a [`FieldParser`].
//! [`StandardFieldParser`] covers the common xBase types:
//!
//! | Type | Storage | Value |
//! |------|---------|-------|
//! | `0` | null flags | `Bytes` |
//! | `C`, `V` | text, NUL/space padded | `Str` |
//! | `D` | `YYYYMMDD` | `Date` or `Null` when blank |
//! | `N`, `F` | ASCII number | `Int`, `Float` or `Null` when blank |
//! | `I`, `+` | i32 LE | `Int` |
//! | `L` | `TtYy` / `FfNn` / `? ` | `Bool` or `Null` |
//! | `O` | f64 LE | `Float` |
//! | `Y` | i64 LE scaled by 10000 | `Float` |
//! | `T` | Julian day + ms, LE | `DateTime` |
//! | `@` | Julian day + ms, BE | `DateTime` |
//! | `M` | memo pointer | `Str` for text memos, otherwise `Bytes` |
//! | `G`, `P` | memo pointer | `Bytes` |
//! | `B` | memo pointer, or f64 LE in Visual FoxPro | `Bytes` / `Float` |
//! | `Q` | varbinary | `Bytes` |

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::dbf::codepage::TextDecoder;
use crate::dbf::constants::JULIAN_DAY_CE_OFFSET;
use crate::dbf::field::FieldDescriptor;
use crate::dbf::memo::{MemoData, MemoStore};
use crate::DbfError;

/// Decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Blank or missing value.
    Null,
    /// Logical value.
    Bool(bool),
    /// Integer value (`I`, `+`, integral `N`).
    Int(i64),
    /// Floating-point value (`N`, `F`, `O`, `Y`, `B`).
    Float(f64),
    /// Text value (`C`, `V`, text memos).
    Str(String),
    /// Calendar date (`D`).
    Date(NaiveDate),
    /// Timestamp (`T`, `@`).
    DateTime(NaiveDateTime),
    /// Undecoded bytes (raw mode, binary memos, `0`, `Q`).
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Narrow a float equal to its own truncation to an integer.
    pub fn normalize_float(self) -> FieldValue {
        match self {
            FieldValue::Float(f)
                if f.is_finite()
                    && f.trunc() == f
                    && f >= i64::MIN as f64
                    && f < i64::MAX as f64 =>
            {
                FieldValue::Int(f as i64)
            }
            other => other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::DateTime(dt) => write!(f, "{}", dt),
            FieldValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Per-table state available to a [`FieldParser`] while decoding a row.
pub struct DecodeContext<'a> {
    /// Decoder for text fields and text memos.
    pub decoder: TextDecoder,
    /// Table version byte.
    pub dbversion: u8,
    /// Memo file of the table ([`NullMemo`](crate::dbf::memo::NullMemo) if none).
    pub memo: &'a mut dyn MemoStore,
}

impl DecodeContext<'_> {
    pub fn is_visual_foxpro(&self) -> bool {
        matches!(self.dbversion, 0x30..=0x32)
    }
}

/// Converts the raw bytes of one field into a [`FieldValue`].
///
/// Every field type in a table is checked with [`supports`](Self::supports)
/// before the first row is read.
pub trait FieldParser: fmt::Debug {
    /// True if `field_type` can be decoded.
    fn supports(&self, field_type: char) -> bool;

    /// Decode `data` (exactly `field.length` bytes) for `field`.
    fn decode(
        &self,
        field: &FieldDescriptor,
        data: &[u8],
        ctx: &mut DecodeContext<'_>,
    ) -> Result<FieldValue, DbfError>;
}

/// Decoder for the standard dBase, FoxPro and Visual FoxPro field types.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFieldParser;

const SUPPORTED_TYPES: &str = "0CDFILMNOTYBGPV@+Q";

impl FieldParser for StandardFieldParser {
    fn supports(&self, field_type: char) -> bool {
        SUPPORTED_TYPES.contains(field_type)
    }

    fn decode(
        &self,
        field: &FieldDescriptor,
        data: &[u8],
        ctx: &mut DecodeContext<'_>,
    ) -> Result<FieldValue, DbfError> {
        match field.field_type {
            '0' | 'Q' => Ok(FieldValue::Bytes(data.to_vec())),
            'C' | 'V' => ctx
                .decoder
                .decode(trim_end(data, b"\0 "))
                .map(FieldValue::Str),
            'D' => decode_date(field, data),
            'N' | 'F' => decode_number(field, data),
            'I' | '+' => decode_i32(field, data),
            'L' => decode_logical(field, data),
            'O' => decode_f64(field, data),
            'Y' => decode_currency(field, data),
            'T' => decode_datetime(field, data, false),
            '@' => decode_datetime(field, data, true),
            'B' if ctx.is_visual_foxpro() => decode_f64(field, data),
            'M' => match fetch_memo(field, data, ctx)? {
                None => Ok(FieldValue::Null),
                Some(MemoData::Text(bytes)) => ctx.decoder.decode(&bytes).map(FieldValue::Str),
                Some(MemoData::Binary(bytes)) => Ok(FieldValue::Bytes(bytes)),
            },
            'G' | 'P' | 'B' => Ok(match fetch_memo(field, data, ctx)? {
                None => FieldValue::Null,
                Some(memo) => FieldValue::Bytes(memo.into_bytes()),
            }),
            other => Err(DbfError::Format(format!(
                "Unknown field type: {:?} in field {}",
                other, field.name
            ))),
        }
    }
}

fn invalid(field: &FieldDescriptor, what: &str, data: &[u8]) -> DbfError {
    DbfError::Format(format!(
        "Invalid {} in field {}: {:?}",
        what,
        field.name,
        String::from_utf8_lossy(data)
    ))
}

fn trim_end<'a>(data: &'a [u8], chars: &[u8]) -> &'a [u8] {
    let end = data
        .iter()
        .rposition(|b| !chars.contains(b))
        .map_or(0, |i| i + 1);
    &data[..end]
}

fn is_blank(data: &[u8], chars: &[u8]) -> bool {
    data.iter().all(|b| chars.contains(b))
}

fn ascii_trimmed(data: &[u8]) -> Option<&str> {
    std::str::from_utf8(data).ok().map(str::trim)
}

fn require_len(field: &FieldDescriptor, data: &[u8], len: usize) -> Result<(), DbfError> {
    if data.len() < len {
        return Err(DbfError::Format(format!(
            "Field {} of type {} needs {} bytes, got {}",
            field.name,
            field.field_type,
            len,
            data.len()
        )));
    }
    Ok(())
}

fn decode_date(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    let part = |range: std::ops::Range<usize>| {
        data.get(range)
            .and_then(ascii_trimmed)
            .and_then(|s| s.parse::<u32>().ok())
    };
    let date = match (part(0..4), part(4..6), part(6..8)) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d),
        _ => None,
    };
    match date {
        Some(d) => Ok(FieldValue::Date(d)),
        None if is_blank(data, b" 0\0") => Ok(FieldValue::Null),
        None => Err(invalid(field, "date", data)),
    }
}

fn decode_number(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    if is_blank(data, b" *\0") {
        return Ok(FieldValue::Null);
    }
    let text = ascii_trimmed(trim_end(data, b"\0")).ok_or_else(|| invalid(field, "number", data))?;
    if let Ok(v) = text.parse::<i64>() {
        return Ok(FieldValue::Int(v));
    }
    text.replace(',', ".")
        .parse::<f64>()
        .map(FieldValue::Float)
        .map_err(|_| invalid(field, "number", data))
}

fn decode_i32(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    require_len(field, data, 4)?;
    Ok(FieldValue::Int(i64::from(LittleEndian::read_i32(data))))
}

fn decode_f64(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    require_len(field, data, 8)?;
    Ok(FieldValue::Float(LittleEndian::read_f64(data)))
}

fn decode_currency(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    require_len(field, data, 8)?;
    Ok(FieldValue::Float(LittleEndian::read_i64(data) as f64 / 10000.0))
}

fn decode_logical(field: &FieldDescriptor, data: &[u8]) -> Result<FieldValue, DbfError> {
    match data.first().copied() {
        Some(b'T' | b't' | b'Y' | b'y') => Ok(FieldValue::Bool(true)),
        Some(b'F' | b'f' | b'N' | b'n') => Ok(FieldValue::Bool(false)),
        Some(b'?' | b' ') | None => Ok(FieldValue::Null),
        Some(_) => Err(invalid(field, "logical value", data)),
    }
}

fn decode_datetime(
    field: &FieldDescriptor,
    data: &[u8],
    big_endian: bool,
) -> Result<FieldValue, DbfError> {
    if is_blank(data, b" ") {
        return Ok(FieldValue::Null);
    }
    require_len(field, data, 8)?;
    let (day, msec) = if big_endian {
        (BigEndian::read_u32(&data[0..4]), BigEndian::read_u32(&data[4..8]))
    } else {
        (
            LittleEndian::read_u32(&data[0..4]),
            LittleEndian::read_u32(&data[4..8]),
        )
    };
    if day == 0 {
        return Ok(FieldValue::Null);
    }

    let days_from_ce = i64::from(day) - JULIAN_DAY_CE_OFFSET;
    let midnight = i32::try_from(days_from_ce)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    midnight
        .and_then(|dt| {
            TimeDelta::try_milliseconds(i64::from(msec)).and_then(|td| dt.checked_add_signed(td))
        })
        .map(FieldValue::DateTime)
        .ok_or_else(|| invalid(field, "timestamp", data))
}

/// Parse a memo pointer: 4-byte LE binary or ASCII digits.
fn memo_index(field: &FieldDescriptor, data: &[u8]) -> Result<u32, DbfError> {
    if data.len() == 4 {
        return Ok(LittleEndian::read_u32(data));
    }
    if is_blank(data, b" \0") {
        return Ok(0);
    }
    ascii_trimmed(trim_end(data, b"\0"))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| invalid(field, "memo index", data))
}

fn fetch_memo(
    field: &FieldDescriptor,
    data: &[u8],
    ctx: &mut DecodeContext<'_>,
) -> Result<Option<MemoData>, DbfError> {
    let index = memo_index(field, data)?;
    ctx.memo.fetch(index)
}
