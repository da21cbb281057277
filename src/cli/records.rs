use std::io::Write;

use crate::cli::app::OpenArgs;
use crate::cli::{open_table, wprintln};
use crate::dbf::cursor::{RecordKind, RecordQuery};
use crate::dbf::record::Record;
use crate::DbfError;

/// Options for the `xdbf records` subcommand.
pub struct RecordsOptions {
    /// How to open the table.
    pub open: OpenArgs,
    /// Print deleted records instead of active ones.
    pub deleted: bool,
    /// Columns to keep, by display or on-disk name.
    pub columns: Option<Vec<String>>,
    /// Maximum number of records to print.
    pub limit: Option<usize>,
    /// Print undecoded field bytes.
    pub raw: bool,
    /// Narrow whole-number `N`/`F` values to integers.
    pub convert_float: bool,
    /// Pretty-print a single JSON array.
    pub pretty: bool,
}

/// Stream records of one kind as JSON.
///
/// By default every record is one compact JSON object per line, written as
/// soon as it is decoded. With `--pretty` the records are collected into an
/// array first.
pub fn execute(opts: &RecordsOptions, writer: &mut dyn Write) -> Result<(), DbfError> {
    let mut table = open_table(&opts.open, opts.raw)?;
    let kind = if opts.deleted {
        RecordKind::Deleted
    } else {
        RecordKind::Active
    };
    let query = RecordQuery {
        columns: opts.columns.clone(),
        nrows: opts.limit,
        convert_float: opts.convert_float,
    };

    let rows = table.iter_with(kind, query, Record::new)?;
    if opts.pretty {
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| DbfError::Format(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    for record in rows {
        let json = serde_json::to_string(&record?)
            .map_err(|e| DbfError::Format(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
    }
    Ok(())
}
