use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::app::OpenArgs;
use crate::cli::{open_table, wprintln};
use crate::dbf::cursor::RecordKind;
use crate::DbfError;

/// Options for the `xdbf count` subcommand.
pub struct CountOptions {
    /// How to open the table.
    pub open: OpenArgs,
    /// Emit output as JSON.
    pub json: bool,
}

#[derive(Serialize)]
struct CountJson<'a> {
    file: &'a str,
    header_records: u32,
    active: usize,
    deleted: usize,
}

/// Count active and deleted rows by scanning markers.
///
/// A difference between the header's record count and the scanned total
/// is reported, since it usually means a truncated or padded file.
pub fn execute(opts: &CountOptions, writer: &mut dyn Write) -> Result<(), DbfError> {
    let mut table = open_table(&opts.open, true)?;
    let active = table.count(RecordKind::Active)?;
    let deleted = table.count(RecordKind::Deleted)?;
    let header_records = table.header().numrecords;

    if opts.json {
        let counts = CountJson {
            file: table.filename(),
            header_records,
            active,
            deleted,
        };
        let json = serde_json::to_string_pretty(&counts)
            .map_err(|e| DbfError::Format(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    wprintln!(writer, "Active:   {}", active)?;
    wprintln!(writer, "Deleted:  {}", deleted)?;
    wprintln!(writer, "Header:   {}", header_records)?;
    if (active + deleted) as u64 != u64::from(header_records) {
        wprintln!(
            writer,
            "{}",
            format!(
                "Header count {} differs from scanned rows {}",
                header_records,
                active + deleted
            )
            .yellow()
        )?;
    }
    Ok(())
}
