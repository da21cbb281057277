//! Table facade.
//!
//! [`Table`] ties the pieces together: it picks the byte source for its
//! input (plain file, buffer or zip member), decodes the header and field
//! descriptors, locates the memo file when a memo-bearing field exists,
//! and hands out record views.
//!
//! # Views
//!
//! [`Table::records`] and [`Table::deleted`] return either the rows
//! materialized by [`Table::load`] or a fresh streaming cursor that starts
//! again at the header boundary. After [`Table::unload`] both go back to
//! streaming.
//!
//! # Example
//!
//! ```no_run
//! use dbf::dbf::table::Table;
//!
//! let mut table = Table::open("people.dbf")?;
//! println!("{} ({})", table.name(), table.dbversion());
//! for record in table.records()? {
//!     let record = record?;
//!     println!("{:?}", record.get("NAME"));
//! }
//! # Ok::<(), dbf::DbfError>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use encoding_rs::Encoding;
use regex::Regex;
use tracing::{debug, warn};

use crate::dbf::archive::{ArchiveOrigin, ZipPackage};
use crate::dbf::codepage::{encoding_for_label, DecodeErrors, TextDecoder};
use crate::dbf::constants::ZIP_SIGNATURE;
use crate::dbf::cursor::{count_records, RecordCursor, RecordKind, RecordQuery, RowLayout};
use crate::dbf::field::{read_field_descriptors, validate_fields, FieldDescriptor, FieldRegistry, NameOptions};
use crate::dbf::header::{read_header, DbfHeader};
use crate::dbf::memo::{memo_candidates, open_memo, MemoStore, NullMemo, MEMO_EXTENSIONS};
use crate::dbf::record::Record;
use crate::dbf::source::ByteSource;
use crate::dbf::value::{FieldParser, FieldValue, StandardFieldParser};
use crate::util::fs::{ifind, ifind_with_extension};
use crate::DbfError;

const TABLE_MEMBER_PATTERN: &str = r"\.dbf$";
const MEMO_MEMBER_PATTERN: &str = r"\.(fpt|dbt)$";

/// Options controlling how a table is opened and decoded.
#[derive(Debug, Clone)]
pub struct DbfOptions {
    /// Text encoding label overriding the language driver guess.
    pub encoding: Option<String>,
    /// Resolve file names case-insensitively.
    pub ignore_case: bool,
    /// Lower-case field names.
    pub lowernames: bool,
    /// Field value decoder.
    pub parser: Arc<dyn FieldParser>,
    /// Load active records right after opening.
    pub load: bool,
    /// Yield undecoded field bytes.
    pub raw: bool,
    /// Open tables whose memo file is missing, with memo values read as null.
    pub ignore_missing_memofile: bool,
    /// Policy for invalid byte sequences in text.
    pub char_decode_errors: DecodeErrors,
    /// Use `name,type,length,decimal_count` as field names.
    pub combined_names: bool,
    /// Suffix repeated field names with `.1`, `.2`, ...
    pub rename_duplicates: bool,
    /// Read the table and memo files fully into memory at open time.
    pub read_to_memory: bool,
    /// Memory-map plain files instead of buffered reads.
    #[cfg(feature = "cli")]
    pub use_mmap: bool,
    /// Table member name inside a zip archive.
    pub member: Option<String>,
    /// Memo file path, or member name inside a zip archive.
    pub memo: Option<String>,
}

impl Default for DbfOptions {
    fn default() -> Self {
        DbfOptions {
            encoding: None,
            ignore_case: true,
            lowernames: false,
            parser: Arc::new(StandardFieldParser),
            load: false,
            raw: false,
            ignore_missing_memofile: false,
            char_decode_errors: DecodeErrors::Strict,
            combined_names: false,
            rename_duplicates: true,
            read_to_memory: true,
            #[cfg(feature = "cli")]
            use_mmap: false,
            member: None,
            memo: None,
        }
    }
}

/// What to open. Zip containers are recognized by extension or signature.
#[derive(Debug, Clone)]
pub enum TableInput {
    /// A file path; `.zip` files are opened as archives.
    Path(PathBuf),
    /// A table image in memory; a `PK\x03\x04` prefix marks a zip image.
    Bytes(Vec<u8>),
    /// An explicit archive with optional table and memo member names.
    Archive {
        archive: ArchiveOrigin,
        member: Option<String>,
        memo: Option<String>,
    },
}

impl From<&str> for TableInput {
    fn from(path: &str) -> Self {
        TableInput::Path(PathBuf::from(path))
    }
}

impl From<String> for TableInput {
    fn from(path: String) -> Self {
        TableInput::Path(PathBuf::from(path))
    }
}

impl From<&Path> for TableInput {
    fn from(path: &Path) -> Self {
        TableInput::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for TableInput {
    fn from(path: PathBuf) -> Self {
        TableInput::Path(path)
    }
}

impl From<Vec<u8>> for TableInput {
    fn from(data: Vec<u8>) -> Self {
        TableInput::Bytes(data)
    }
}

/// Where the memo file was found.
enum MemoLocation {
    File(PathBuf),
    Member(ArchiveOrigin, String),
}

/// Resolved data source plus what is needed to find its memo file.
struct Opened {
    source: ByteSource,
    filename: String,
    name: String,
    memo_finder: MemoFinder,
}

enum MemoFinder {
    /// Memo files live next to the table on disk.
    Directory { table_path: PathBuf, explicit: Option<String> },
    /// Memo files are members of the same archive.
    Archive {
        origin: ArchiveOrigin,
        names: Vec<String>,
        table_member: String,
        explicit: Option<String>,
    },
    /// In-memory tables cannot have a memo file.
    None,
}

/// Rows of one kind, either materialized or streamed.
pub enum RecordView<'t> {
    Loaded(std::slice::Iter<'t, Record>),
    Streaming(RecordCursor<'t, Record>),
}

impl Iterator for RecordView<'_> {
    type Item = Result<Record, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordView::Loaded(rows) => rows.next().cloned().map(Ok),
            RecordView::Streaming(cursor) => cursor.next(),
        }
    }
}

/// An open DBF table.
pub struct Table {
    name: String,
    filename: String,
    header: DbfHeader,
    fields: Vec<FieldDescriptor>,
    field_names: Vec<String>,
    decoder: TextDecoder,
    parser: Arc<dyn FieldParser>,
    raw: bool,
    data: ByteSource,
    memo: Box<dyn MemoStore>,
    memo_name: Option<String>,
    records: Option<Vec<Record>>,
    deleted: Option<Vec<Record>>,
    closed: bool,
}

impl Table {
    /// Open a table with default options.
    pub fn open<I: Into<TableInput>>(input: I) -> Result<Self, DbfError> {
        Self::open_with(input, DbfOptions::default())
    }

    /// Open a table.
    ///
    /// Fails with [`DbfError::NotFound`] if the table or a required memo
    /// file is missing, and with [`DbfError::Format`] if the header or a
    /// field descriptor is malformed. No row is read before every field
    /// passed validation.
    pub fn open_with<I: Into<TableInput>>(input: I, options: DbfOptions) -> Result<Self, DbfError> {
        let Opened {
            mut source,
            filename,
            name,
            memo_finder,
        } = open_input(input.into(), &options)?;

        if options.read_to_memory {
            source.materialize()?;
        }

        let header = read_header(&mut source)?;
        let raw_fields = read_field_descriptors(&mut source)?;

        let decoder = match &options.encoding {
            Some(label) => TextDecoder::new(encoding_for_label(label)?, options.char_decode_errors),
            None => TextDecoder::for_driver(header.language_driver, options.char_decode_errors),
        };

        let names = NameOptions {
            lowernames: options.lowernames,
            combined_names: options.combined_names,
            rename_duplicates: options.rename_duplicates,
        };
        let fields = FieldRegistry::new(names, &decoder).build(&raw_fields)?;
        validate_fields(&fields, options.parser.as_ref())?;
        let field_names = fields.iter().map(|f| f.name.clone()).collect();

        debug!(
            table = %filename,
            dbversion = header.dbversion,
            numrecords = header.numrecords,
            headerlen = header.headerlen,
            recordlen = header.recordlen,
            fields = fields.len(),
            encoding = decoder.encoding().name(),
            "opened table"
        );

        let (memo, memo_name) = if fields.iter().any(FieldDescriptor::is_memo) {
            open_memo_store(&memo_finder, &filename, header.dbversion, &options)?
        } else {
            (Box::new(NullMemo) as Box<dyn MemoStore>, None)
        };

        let mut table = Table {
            name,
            filename,
            header,
            fields,
            field_names,
            decoder,
            parser: options.parser,
            raw: options.raw,
            data: source,
            memo,
            memo_name,
            records: None,
            deleted: None,
            closed: false,
        };

        if options.load {
            table.load()?;
        }
        Ok(table)
    }

    /// Lower-cased file stem of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description of the table's origin (path, archive member or buffer).
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    /// Last-update date, `None` when the stored date is invalid.
    pub fn date(&self) -> Option<NaiveDate> {
        self.header.date()
    }

    /// Human-readable dialect name.
    pub fn dbversion(&self) -> &'static str {
        self.header.dbversion_name()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Encoding used for names and text values.
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    /// Encoding name for display, flagging code pages decoded as ASCII only.
    pub fn encoding_label(&self) -> String {
        self.decoder.label()
    }

    /// Memo file path or member name, if one was opened.
    pub fn memo_name(&self) -> Option<&str> {
        self.memo_name.as_deref()
    }

    /// True after [`load`](Self::load) and before [`unload`](Self::unload).
    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), DbfError> {
        if self.closed {
            Err(DbfError::Closed)
        } else {
            Ok(())
        }
    }

    /// Materialize active records, narrowing integral floats.
    pub fn load(&mut self) -> Result<(), DbfError> {
        self.load_with(false, RecordQuery::new().convert_float(true))
    }

    /// Materialize active records, and deleted records when `include_deleted`.
    ///
    /// Active records already loaded are kept as they are.
    pub fn load_with(&mut self, include_deleted: bool, query: RecordQuery) -> Result<(), DbfError> {
        self.ensure_open()?;
        if self.records.is_none() {
            let rows = self
                .iter_with(RecordKind::Active, query.clone(), Record::new)?
                .collect::<Result<Vec<_>, _>>()?;
            self.records = Some(rows);
        }
        if include_deleted {
            let rows = self
                .iter_with(RecordKind::Deleted, query, Record::new)?
                .collect::<Result<Vec<_>, _>>()?;
            self.deleted = Some(rows);
        }
        Ok(())
    }

    /// Drop materialized records; views stream again.
    pub fn unload(&mut self) {
        self.records = None;
        self.deleted = None;
    }

    /// Active records.
    pub fn records(&mut self) -> Result<RecordView<'_>, DbfError> {
        self.view(RecordKind::Active)
    }

    /// Soft-deleted records.
    pub fn deleted(&mut self) -> Result<RecordView<'_>, DbfError> {
        self.view(RecordKind::Deleted)
    }

    fn view(&mut self, kind: RecordKind) -> Result<RecordView<'_>, DbfError> {
        self.ensure_open()?;
        let loaded = match kind {
            RecordKind::Active => self.records.is_some(),
            RecordKind::Deleted => self.deleted.is_some(),
        };
        if !loaded {
            return self
                .iter_with(kind, RecordQuery::new(), Record::new)
                .map(RecordView::Streaming);
        }
        let rows = match kind {
            RecordKind::Active => self.records.as_deref(),
            RecordKind::Deleted => self.deleted.as_deref(),
        };
        Ok(RecordView::Loaded(rows.unwrap_or_default().iter()))
    }

    /// Stream rows of `kind` through a caller-supplied record builder.
    pub fn iter_with<'s, R, F>(
        &'s mut self,
        kind: RecordKind,
        query: RecordQuery,
        assemble: F,
    ) -> Result<RecordCursor<'s, R>, DbfError>
    where
        F: FnMut(Vec<(String, FieldValue)>) -> R + 's,
    {
        self.ensure_open()?;
        let layout = RowLayout {
            fields: &self.fields,
            headerlen: u64::from(self.header.headerlen),
            recordlen: self.header.recordlen,
            dbversion: self.header.dbversion,
            decoder: self.decoder,
            parser: self.parser.as_ref(),
            raw: self.raw,
        };
        Ok(RecordCursor::new(
            &mut self.data,
            self.memo.as_mut(),
            layout,
            kind,
            query,
            Box::new(assemble),
        ))
    }

    /// Count rows of `kind` from their markers, without decoding.
    pub fn count(&mut self, kind: RecordKind) -> Result<usize, DbfError> {
        self.ensure_open()?;
        count_records(
            &mut self.data,
            u64::from(self.header.headerlen),
            self.header.recordlen,
            kind,
        )
    }

    /// Number of active records: the loaded list's length, or a marker count.
    pub fn num_records(&mut self) -> Result<usize, DbfError> {
        match &self.records {
            Some(rows) => Ok(rows.len()),
            None => self.count(RecordKind::Active),
        }
    }

    /// Byte offset of the physical row at `index`.
    pub fn row_offset(&self, index: u64) -> Result<u64, DbfError> {
        index
            .checked_mul(u64::from(self.header.recordlen))
            .and_then(|o| o.checked_add(u64::from(self.header.headerlen)))
            .ok_or_else(|| {
                DbfError::Argument(format!(
                    "Row {} is beyond the addressable range of table {}",
                    index, self.filename
                ))
            })
    }

    /// Raw bytes of the physical row at `index`, marker included.
    pub fn read_raw_row(&mut self, index: u64) -> Result<Vec<u8>, DbfError> {
        self.ensure_open()?;
        let recordlen = u64::from(self.header.recordlen);
        let offset = self.row_offset(index)?;
        self.data.seek(std::io::SeekFrom::Start(offset))?;
        let row = self.data.read(recordlen as usize)?;
        if row.is_empty() {
            return Err(DbfError::Argument(format!(
                "Row {} is beyond the end of table {}",
                index, self.filename
            )));
        }
        Ok(row)
    }

    /// The first `headerlen` bytes: table header, field descriptors and padding.
    pub fn read_header_block(&mut self) -> Result<Vec<u8>, DbfError> {
        self.ensure_open()?;
        self.data.seek(std::io::SeekFrom::Start(0))?;
        self.data.read(usize::from(self.header.headerlen))
    }

    /// Release both sources and drop loaded records. Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.data.close();
        self.memo.close();
        self.memo = Box::new(NullMemo);
        self.unload();
        self.closed = true;
        debug!(table = %self.filename, "closed table");
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.closed {
            "closed"
        } else if self.is_loaded() {
            "loaded"
        } else {
            "unloaded"
        };
        write!(f, "<{} DBF table {:?}>", status, self.filename)
    }
}

fn pattern(expr: &str) -> Result<Regex, DbfError> {
    Regex::new(expr).map_err(|e| DbfError::Argument(format!("Invalid member pattern {}: {}", expr, e)))
}

fn file_stem_lower(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_lowercase(),
        _ => base.to_lowercase(),
    }
}

#[cfg(feature = "cli")]
fn open_path(path: &Path, options: &DbfOptions) -> Result<ByteSource, DbfError> {
    if options.use_mmap {
        ByteSource::open_mmap(path)
    } else {
        ByteSource::open_file(path)
    }
}

#[cfg(not(feature = "cli"))]
fn open_path(path: &Path, _options: &DbfOptions) -> Result<ByteSource, DbfError> {
    ByteSource::open_file(path)
}

fn open_input(input: TableInput, options: &DbfOptions) -> Result<Opened, DbfError> {
    match input {
        TableInput::Path(path) => {
            let path = if options.ignore_case {
                ifind(&path).ok_or_else(|| {
                    DbfError::NotFound(format!("could not find file {}", path.display()))
                })?
            } else {
                path
            };
            let is_zip = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if is_zip {
                return open_archive(
                    ArchiveOrigin::Path(path),
                    options.member.clone(),
                    options.memo.clone(),
                    options,
                );
            }
            let source = open_path(&path, options)?;
            let filename = path.display().to_string();
            Ok(Opened {
                source,
                name: file_stem_lower(&filename),
                filename,
                memo_finder: MemoFinder::Directory {
                    table_path: path,
                    explicit: options.memo.clone(),
                },
            })
        }
        TableInput::Bytes(data) => {
            if data.starts_with(&ZIP_SIGNATURE) {
                return open_archive(
                    ArchiveOrigin::Bytes(Arc::from(data)),
                    options.member.clone(),
                    options.memo.clone(),
                    options,
                );
            }
            Ok(Opened {
                source: ByteSource::from_bytes(data),
                filename: "<memory>".to_string(),
                name: String::new(),
                memo_finder: MemoFinder::None,
            })
        }
        TableInput::Archive {
            archive,
            member,
            memo,
        } => open_archive(
            archive,
            member.or_else(|| options.member.clone()),
            memo.or_else(|| options.memo.clone()),
            options,
        ),
    }
}

fn open_archive(
    origin: ArchiveOrigin,
    member: Option<String>,
    memo: Option<String>,
    options: &DbfOptions,
) -> Result<Opened, DbfError> {
    let mut package = ZipPackage::open(origin.clone())?;
    let desired = member.unwrap_or_else(|| match &origin {
        ArchiveOrigin::Path(p) => format!("{}.dbf", file_stem_lower(&p.display().to_string())),
        ArchiveOrigin::Bytes(_) => "table.dbf".to_string(),
    });
    let table_member = package
        .resolve(&desired, Some(&pattern(TABLE_MEMBER_PATTERN)?))
        .ok_or_else(|| {
            DbfError::NotFound(format!("Can't find dbf-file {} in archive", desired))
        })?;
    let names = package.names();

    let source = if options.read_to_memory {
        ByteSource::from_bytes(package.read_member(&table_member)?)
    } else {
        ByteSource::from_zip_member(package.into_member(&table_member)?)
    };

    let filename = match &origin {
        ArchiveOrigin::Path(p) => format!("{}!{}", p.display(), table_member),
        ArchiveOrigin::Bytes(_) => format!("<zip>!{}", table_member),
    };
    Ok(Opened {
        source,
        name: file_stem_lower(&table_member),
        filename,
        memo_finder: MemoFinder::Archive {
            origin,
            names,
            table_member,
            explicit: memo,
        },
    })
}

fn find_file(path: &Path, ignore_case: bool) -> Option<PathBuf> {
    if ignore_case {
        ifind(path)
    } else {
        path.exists().then(|| path.to_path_buf())
    }
}

/// A relative memo path is looked up next to the table first, then as given.
fn explicit_memo_paths(table_path: &Path, memo: &Path) -> Vec<PathBuf> {
    match table_path.parent() {
        Some(dir) if memo.is_relative() && !dir.as_os_str().is_empty() => {
            vec![dir.join(memo), memo.to_path_buf()]
        }
        _ => vec![memo.to_path_buf()],
    }
}

fn locate_memo(finder: &MemoFinder, options: &DbfOptions) -> Result<Option<MemoLocation>, DbfError> {
    let found = match finder {
        MemoFinder::None => None,
        MemoFinder::Directory {
            table_path,
            explicit,
        } => {
            let found = match explicit {
                Some(path) => explicit_memo_paths(table_path, Path::new(path))
                    .iter()
                    .find_map(|c| find_file(c, options.ignore_case)),
                None => MEMO_EXTENSIONS.iter().find_map(|ext| {
                    if options.ignore_case {
                        ifind_with_extension(table_path, ext)
                    } else {
                        find_file(&table_path.with_extension(ext), false)
                    }
                }),
            };
            found.map(MemoLocation::File)
        }
        MemoFinder::Archive {
            origin,
            names,
            table_member,
            explicit,
        } => {
            let memo_pattern = pattern(MEMO_MEMBER_PATTERN)?;
            let candidates = match explicit {
                Some(name) => vec![name.clone()],
                None => memo_candidates(table_member),
            };
            candidates
                .iter()
                .find_map(|c| crate::dbf::archive::resolve_member(names, c, None))
                .or_else(|| {
                    crate::dbf::archive::resolve_member(names, &candidates[0], Some(&memo_pattern))
                })
                .map(|(name, rule)| {
                    debug!(member = %name, ?rule, "resolved memo member");
                    MemoLocation::Member(origin.clone(), name)
                })
        }
    };
    Ok(found)
}

fn open_memo_store(
    finder: &MemoFinder,
    table: &str,
    dbversion: u8,
    options: &DbfOptions,
) -> Result<(Box<dyn MemoStore>, Option<String>), DbfError> {
    let location = match locate_memo(finder, options)? {
        Some(location) => location,
        None if options.ignore_missing_memofile => {
            warn!(table, "memo file missing, memo fields will read as null");
            return Ok((Box::new(NullMemo), None));
        }
        None => {
            return Err(DbfError::NotFound(format!("missing memo file for {}", table)));
        }
    };

    let (mut source, memo_name) = match location {
        MemoLocation::File(path) => (
            open_path(&path, options)?,
            path.display().to_string(),
        ),
        MemoLocation::Member(origin, name) => {
            let mut package = ZipPackage::open(origin)?;
            let source = if options.read_to_memory {
                ByteSource::from_bytes(package.read_member(&name)?)
            } else {
                ByteSource::from_zip_member(package.into_member(&name)?)
            };
            (source, name)
        }
    };
    debug!(memo = %memo_name, "opened memo file");

    if options.raw {
        source.close();
        return Ok((Box::new(NullMemo), Some(memo_name)));
    }
    if options.read_to_memory {
        source.materialize()?;
    }
    let store = open_memo(source, &memo_name, dbversion)?;
    Ok((store, Some(memo_name)))
}
