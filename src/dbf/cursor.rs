//! Streaming record cursor.
//!
//! A [`RecordCursor`] walks the row area of a table one marker byte at a
//! time. Rows whose marker matches the requested [`RecordKind`] are decoded
//! field by field, rows with any other marker are skipped with a relative
//! seek of `recordlen - 1`, and the walk ends at the `0x1A` end-of-table
//! marker, at end of resource, or at a row cut short by end of resource.
//!
//! The cursor never builds a record type itself: decoded `(name, value)`
//! pairs go through an assembly closure chosen by the caller.

use std::io::SeekFrom;

use serde::Serialize;
use tracing::trace;

use crate::dbf::codepage::TextDecoder;
use crate::dbf::constants::*;
use crate::dbf::field::FieldDescriptor;
use crate::dbf::memo::MemoStore;
use crate::dbf::source::ByteSource;
use crate::dbf::value::{DecodeContext, FieldParser, FieldValue};
use crate::DbfError;

/// Which rows a cursor yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    /// Rows marked `' '`.
    Active,
    /// Rows marked `'*'`.
    Deleted,
}

impl RecordKind {
    /// Marker byte selected by this kind.
    pub fn marker(self) -> u8 {
        match self {
            RecordKind::Active => MARKER_ACTIVE,
            RecordKind::Deleted => MARKER_DELETED,
        }
    }
}

/// Column projection, row limit and float normalization for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Keep only fields whose display or on-disk name is listed.
    pub columns: Option<Vec<String>>,
    /// Stop after this many matching rows.
    pub nrows: Option<usize>,
    /// Narrow integral `N`/`F` floats to integers.
    pub convert_float: bool,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn nrows(mut self, nrows: usize) -> Self {
        self.nrows = Some(nrows);
        self
    }

    pub fn convert_float(mut self, convert_float: bool) -> Self {
        self.convert_float = convert_float;
        self
    }

    fn keeps(&self, field: &FieldDescriptor) -> bool {
        match &self.columns {
            None => true,
            Some(columns) => columns.iter().any(|c| field.matches(c)),
        }
    }
}

/// Everything a cursor needs to know about the table it walks.
#[derive(Clone, Copy)]
pub struct RowLayout<'t> {
    pub fields: &'t [FieldDescriptor],
    pub headerlen: u64,
    pub recordlen: u16,
    pub dbversion: u8,
    pub decoder: TextDecoder,
    pub parser: &'t dyn FieldParser,
    /// Yield undecoded bytes instead of calling the parser.
    pub raw: bool,
}

impl RowLayout<'_> {
    /// Bytes read per matching row after the marker.
    ///
    /// `recordlen` wins when it leaves padding after the last field, so the
    /// next marker stays aligned.
    fn row_width(&self) -> usize {
        let fields: usize = self.fields.iter().map(|f| f.length).sum();
        fields.max(usize::from(self.recordlen).saturating_sub(1))
    }

    /// Relative seek that skips a non-matching row after its marker.
    fn skip_width(&self) -> i64 {
        (i64::from(self.recordlen) - 1).max(0)
    }
}

/// Builds the caller's record type from ordered `(name, value)` pairs.
pub type Assemble<'t, R> = Box<dyn FnMut(Vec<(String, FieldValue)>) -> R + 't>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Start,
    Scanning,
    Done,
}

/// Lazy, finite sequence of decoded rows of one [`RecordKind`].
pub struct RecordCursor<'t, R> {
    source: &'t mut ByteSource,
    memo: &'t mut dyn MemoStore,
    layout: RowLayout<'t>,
    kind: RecordKind,
    query: RecordQuery,
    remaining: Option<usize>,
    assemble: Assemble<'t, R>,
    state: CursorState,
    row: Vec<u8>,
}

impl<'t, R> RecordCursor<'t, R> {
    pub fn new(
        source: &'t mut ByteSource,
        memo: &'t mut dyn MemoStore,
        layout: RowLayout<'t>,
        kind: RecordKind,
        query: RecordQuery,
        assemble: Assemble<'t, R>,
    ) -> Self {
        let remaining = query.nrows;
        let row = vec![0u8; layout.row_width()];
        RecordCursor {
            source,
            memo,
            layout,
            kind,
            query,
            remaining,
            assemble,
            state: CursorState::Start,
            row,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// True once the cursor reached end of table or its row limit.
    pub fn is_done(&self) -> bool {
        self.state == CursorState::Done
    }

    /// Read one marker and act on it. `Ok(None)` means keep scanning.
    fn step(&mut self) -> Result<Option<R>, DbfError> {
        match self.source.read_byte()? {
            None | Some(MARKER_EOF) => {
                self.state = CursorState::Done;
                Ok(None)
            }
            Some(marker) if marker == self.kind.marker() => {
                if let Some(n) = self.remaining {
                    if n == 0 {
                        self.state = CursorState::Done;
                        return Ok(None);
                    }
                    self.remaining = Some(n - 1);
                }
                self.decode_row()
            }
            Some(marker) => {
                trace!(marker, "skipping record");
                self.source.skip(self.layout.skip_width())?;
                Ok(None)
            }
        }
    }

    fn decode_row(&mut self) -> Result<Option<R>, DbfError> {
        let got = self.source.read_into(&mut self.row)?;
        if got < self.row.len() {
            trace!(got, expected = self.row.len(), "row cut short by end of data");
            self.state = CursorState::Done;
            return Ok(None);
        }

        let layout = self.layout;
        let mut ctx = DecodeContext {
            decoder: layout.decoder,
            dbversion: layout.dbversion,
            memo: &mut *self.memo,
        };

        let mut items = Vec::with_capacity(layout.fields.len());
        for field in layout.fields {
            let data = &self.row[field.offset..field.offset + field.length];
            let value = if layout.raw {
                FieldValue::Bytes(data.to_vec())
            } else {
                layout.parser.decode(field, data, &mut ctx)?
            };
            if !self.query.keeps(field) {
                continue;
            }
            let value = if self.query.convert_float && matches!(field.field_type, 'N' | 'F') {
                value.normalize_float()
            } else {
                value
            };
            items.push((field.name.clone(), value));
        }

        Ok(Some((self.assemble)(items)))
    }
}

impl<R> Iterator for RecordCursor<'_, R> {
    type Item = Result<R, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let result = match self.state {
                CursorState::Done => return None,
                CursorState::Start => self
                    .source
                    .seek(SeekFrom::Start(self.layout.headerlen))
                    .map(|_| {
                        self.state = CursorState::Scanning;
                        None
                    }),
                CursorState::Scanning => self.step(),
            };
            match result {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => {
                    self.state = CursorState::Done;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Count rows of `kind` by scanning markers only.
pub fn count_records(
    source: &mut ByteSource,
    headerlen: u64,
    recordlen: u16,
    kind: RecordKind,
) -> Result<usize, DbfError> {
    let end = source.len()?;
    let width = u64::from(recordlen.max(1));
    let skip = width as i64 - 1;
    let wanted = kind.marker();
    let mut count = 0;
    let mut offset = headerlen;
    source.seek(SeekFrom::Start(headerlen))?;

    loop {
        match source.read_byte()? {
            None | Some(MARKER_EOF) => break,
            // a row cut short by end of data ends the table
            Some(_) if offset + width > end => break,
            Some(marker) => {
                if marker == wanted {
                    count += 1;
                }
                source.skip(skip)?;
                offset += width;
            }
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf::codepage::DecodeErrors;
    use crate::dbf::memo::NullMemo;
    use crate::dbf::value::StandardFieldParser;

    fn field(name: &str, field_type: char, length: usize, offset: usize) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            name_real: name.to_string(),
            field_type,
            address: 0,
            length,
            decimal_count: 0,
            offset,
            workarea_id: 0,
            set_fields_flag: 0,
            index_field_flag: 0,
        }
    }

    /// Two-byte "header", NAME C3 + QTY N4 rows.
    fn table_bytes(rows: &[(u8, &str, &str)], eof: bool) -> Vec<u8> {
        let mut data = vec![0xEE, 0xEE];
        for (marker, name, qty) in rows {
            data.push(*marker);
            data.extend_from_slice(name.as_bytes());
            data.extend_from_slice(qty.as_bytes());
        }
        if eof {
            data.push(MARKER_EOF);
        }
        data
    }

    fn fields() -> Vec<FieldDescriptor> {
        vec![field("NAME", 'C', 3, 0), field("QTY", 'N', 4, 3)]
    }

    fn collect(
        data: Vec<u8>,
        kind: RecordKind,
        query: RecordQuery,
        raw: bool,
    ) -> Vec<Vec<(String, FieldValue)>> {
        let fields = fields();
        let parser = StandardFieldParser;
        let layout = RowLayout {
            fields: &fields,
            headerlen: 2,
            recordlen: 8,
            dbversion: 0x03,
            decoder: TextDecoder::new(encoding_rs::WINDOWS_1252, DecodeErrors::Strict),
            parser: &parser,
            raw,
        };
        let mut source = ByteSource::from_bytes(data);
        let mut memo = NullMemo;
        RecordCursor::new(&mut source, &mut memo, layout, kind, query, Box::new(|items: Vec<(String, FieldValue)>| items))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_active_and_deleted_filters() {
        let data = table_bytes(&[(b' ', "ann", "   1"), (b'*', "bob", "   2"), (b' ', "cat", "   3")], true);
        let active = collect(data.clone(), RecordKind::Active, RecordQuery::new(), false);
        assert_eq!(active.len(), 2);
        assert_eq!(active[1][0].1, FieldValue::Str("cat".into()));

        let deleted = collect(data, RecordKind::Deleted, RecordQuery::new(), false);
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0][1].1, FieldValue::Int(2));
    }

    #[test]
    fn test_stops_at_eof_marker() {
        let mut data = table_bytes(&[(b' ', "ann", "   1")], true);
        data.extend_from_slice(b" zzz   9");
        let rows = collect(data, RecordKind::Active, RecordQuery::new(), false);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_truncated_row_ends_table() {
        let mut data = table_bytes(&[(b' ', "ann", "   1")], false);
        data.extend_from_slice(b" bo");
        let rows = collect(data, RecordKind::Active, RecordQuery::new(), false);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_nrows_limit() {
        let data = table_bytes(&[(b' ', "ann", "   1"), (b' ', "bob", "   2")], true);
        assert!(collect(data.clone(), RecordKind::Active, RecordQuery::new().nrows(0), false).is_empty());
        assert_eq!(
            collect(data, RecordKind::Active, RecordQuery::new().nrows(1), false).len(),
            1
        );
    }

    #[test]
    fn test_nrows_zero_reads_no_field_bytes() {
        // the field bytes would fail to decode if they were touched
        let data = table_bytes(&[(b' ', "ann", "abcd")], true);
        assert!(collect(data, RecordKind::Active, RecordQuery::new().nrows(0), false).is_empty());
    }

    #[test]
    fn test_column_projection_and_raw() {
        let data = table_bytes(&[(b' ', "ann", "   1")], true);
        let rows = collect(data.clone(), RecordKind::Active, RecordQuery::new().columns(["QTY"]), false);
        assert_eq!(rows[0], vec![("QTY".to_string(), FieldValue::Int(1))]);

        let raw = collect(data, RecordKind::Active, RecordQuery::new(), true);
        assert_eq!(raw[0][1].1, FieldValue::Bytes(b"   1".to_vec()));
    }

    #[test]
    fn test_convert_float() {
        let data = table_bytes(&[(b' ', "ann", " 2.0")], true);
        let plain = collect(data.clone(), RecordKind::Active, RecordQuery::new(), false);
        assert_eq!(plain[0][1].1, FieldValue::Float(2.0));
        let converted = collect(data, RecordKind::Active, RecordQuery::new().convert_float(true), false);
        assert_eq!(converted[0][1].1, FieldValue::Int(2));
    }

    #[test]
    fn test_count_matches_decoded() {
        let data = table_bytes(
            &[(b' ', "ann", "   1"), (b'*', "bob", "   2"), (b'?', "xxx", "xxxx"), (b' ', "cat", "   3")],
            true,
        );
        for kind in [RecordKind::Active, RecordKind::Deleted] {
            let mut src = ByteSource::from_bytes(data.clone());
            let counted = count_records(&mut src, 2, 8, kind).unwrap();
            let decoded = collect(data.clone(), kind, RecordQuery::new(), false).len();
            assert_eq!(counted, decoded);
        }
    }

    #[test]
    fn test_padded_rows_stay_aligned() {
        let fields = fields();
        let parser = StandardFieldParser;
        let layout = RowLayout {
            fields: &fields,
            headerlen: 2,
            recordlen: 10,
            dbversion: 0x03,
            decoder: TextDecoder::new(encoding_rs::WINDOWS_1252, DecodeErrors::Strict),
            parser: &parser,
            raw: false,
        };
        let mut data = vec![0xEE, 0xEE];
        data.extend_from_slice(b" ann   1\0\0");
        data.extend_from_slice(b" bob   2\0\0");
        data.push(MARKER_EOF);
        let mut source = ByteSource::from_bytes(data);
        let mut memo = NullMemo;
        let names: Vec<FieldValue> = RecordCursor::new(
            &mut source,
            &mut memo,
            layout,
            RecordKind::Active,
            RecordQuery::new(),
            Box::new(|mut items: Vec<(String, FieldValue)>| items.remove(0).1),
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(
            names,
            vec![FieldValue::Str("ann".into()), FieldValue::Str("bob".into())]
        );
    }

    #[test]
    fn test_decode_error_ends_cursor() {
        let data = table_bytes(&[(b' ', "ann", "abcd"), (b' ', "bob", "   2")], true);
        let fields = fields();
        let parser = StandardFieldParser;
        let layout = RowLayout {
            fields: &fields,
            headerlen: 2,
            recordlen: 8,
            dbversion: 0x03,
            decoder: TextDecoder::new(encoding_rs::WINDOWS_1252, DecodeErrors::Strict),
            parser: &parser,
            raw: false,
        };
        let mut source = ByteSource::from_bytes(data);
        let mut memo = NullMemo;
        let mut cursor = RecordCursor::new(
            &mut source,
            &mut memo,
            layout,
            RecordKind::Active,
            RecordQuery::new(),
            Box::new(|items: Vec<(String, FieldValue)>| items.len()),
        );
        assert!(matches!(cursor.next(), Some(Err(DbfError::Format(_)))));
        assert!(cursor.is_done());
        assert!(cursor.next().is_none());
    }
}
