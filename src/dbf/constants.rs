//! DBF on-disk structure constants.
//!
//! Byte offsets within the 32-byte table header and the 32-byte field
//! descriptor, record marker bytes, and memo file layout values. All
//! multi-byte integers in the table file are little-endian.

// ── Table header (32 bytes) ─────────────────────────────────────────

/// Size of the fixed table header.
pub const DBF_HEADER_SIZE: usize = 32;

/// Version / dialect byte.
pub const HDR_DBVERSION: usize = 0;
/// Last-update year (two digits, see `expand_year`).
pub const HDR_YEAR: usize = 1;
/// Last-update month.
pub const HDR_MONTH: usize = 2;
/// Last-update day.
pub const HDR_DAY: usize = 3;
/// Number of records (u32).
pub const HDR_NUMRECORDS: usize = 4;
/// Header length in bytes, including field descriptors and terminator (u16).
pub const HDR_HEADERLEN: usize = 8;
/// Record length in bytes, including the marker byte (u16).
pub const HDR_RECORDLEN: usize = 10;
/// Reserved (u16).
pub const HDR_RESERVED1: usize = 12;
/// Incomplete transaction flag.
pub const HDR_INCOMPLETE_TRANSACTION: usize = 14;
/// Encryption flag.
pub const HDR_ENCRYPTION_FLAG: usize = 15;
/// Free record thread (u32, multi-user dBase).
pub const HDR_FREE_RECORD_THREAD: usize = 16;
/// Reserved (u32).
pub const HDR_RESERVED2: usize = 20;
/// Reserved (u32).
pub const HDR_RESERVED3: usize = 24;
/// Production MDX flag.
pub const HDR_MDX_FLAG: usize = 28;
/// Language driver byte (code page).
pub const HDR_LANGUAGE_DRIVER: usize = 29;
/// Reserved (u16).
pub const HDR_RESERVED4: usize = 30;

// ── Field descriptor (32 bytes) ─────────────────────────────────────

/// Size of one field descriptor.
pub const FIELD_DESCRIPTOR_SIZE: usize = 32;
/// Size of the NUL-terminated name slot.
pub const FIELD_NAME_SIZE: usize = 11;

pub const FLD_NAME: usize = 0;
pub const FLD_TYPE: usize = 11;
pub const FLD_ADDRESS: usize = 12;
pub const FLD_LENGTH: usize = 16;
pub const FLD_DECIMAL_COUNT: usize = 17;
pub const FLD_RESERVED1: usize = 18;
pub const FLD_WORKAREA_ID: usize = 20;
pub const FLD_RESERVED2: usize = 21;
pub const FLD_RESERVED3: usize = 22;
pub const FLD_SET_FIELDS_FLAG: usize = 23;
pub const FLD_RESERVED4: usize = 24;
pub const FLD_INDEX_FIELD_FLAG: usize = 31;

/// Terminators that end the field descriptor block.
pub const FIELD_TERMINATOR_CR: u8 = b'\r';
pub const FIELD_TERMINATOR_LF: u8 = b'\n';

// ── Record markers ──────────────────────────────────────────────────

/// Marker of an active (not deleted) record.
pub const MARKER_ACTIVE: u8 = b' ';
/// Marker of a soft-deleted record.
pub const MARKER_DELETED: u8 = b'*';
/// End-of-table sentinel.
pub const MARKER_EOF: u8 = 0x1A;

/// Field types whose values live in a companion memo file.
pub const MEMO_FIELD_TYPES: [char; 4] = ['M', 'G', 'P', 'B'];

// ── Memo files ──────────────────────────────────────────────────────

/// dBase III memo block size.
pub const DB3_MEMO_BLOCK_SIZE: u64 = 512;
/// Default dBase IV memo block size when the header stores zero.
pub const DB4_MEMO_DEFAULT_BLOCK_SIZE: u64 = 512;
/// Offset of the dBase IV block size (u16 LE) in the memo header.
pub const DB4_MEMO_BLOCK_SIZE_OFFSET: u64 = 20;
/// Offset of the FoxPro block size (u16 BE) in the memo header.
pub const FPT_BLOCK_SIZE_OFFSET: u64 = 6;
/// FoxPro memo block type for text.
pub const FPT_TYPE_TEXT: u32 = 1;
/// Block size used when a FoxPro memo header stores zero.
pub const FPT_DEFAULT_BLOCK_SIZE: u64 = 64;
/// dBase III memo terminator.
pub const DB3_MEMO_TERMINATOR: u8 = 0x1A;
/// dBase IV memo terminator.
pub const DB4_MEMO_TERMINATOR: u8 = 0x1F;
/// Size of the per-block header in FoxPro and dBase IV memo files.
pub const MEMO_BLOCK_HEADER_SIZE: usize = 8;

/// Local file header signature of a zip container.
pub const ZIP_SIGNATURE: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Julian day number of 0001-01-01 minus one (proleptic Gregorian).
pub const JULIAN_DAY_CE_OFFSET: i64 = 1_721_425;
