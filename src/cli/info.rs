use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::app::OpenArgs;
use crate::cli::{open_table, wprint, wprintln};
use crate::dbf::field::FieldDescriptor;
use crate::dbf::header::DbfHeader;
use crate::DbfError;

/// Options for the `xdbf info` subcommand.
pub struct InfoOptions {
    /// How to open the table.
    pub open: OpenArgs,
    /// Emit output as JSON.
    pub json: bool,
}

#[derive(Serialize)]
struct TableInfoJson<'a> {
    file: &'a str,
    name: &'a str,
    dbversion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo_file: Option<&'a str>,
    header: &'a DbfHeader,
    fields: &'a [FieldDescriptor],
}

/// Describe a table: header values, dialect, last-update date, text
/// encoding, memo file and one line per field.
pub fn execute(opts: &InfoOptions, writer: &mut dyn Write) -> Result<(), DbfError> {
    let table = open_table(&opts.open, false)?;
    let header = table.header();

    if opts.json {
        let info = TableInfoJson {
            file: table.filename(),
            name: table.name(),
            dbversion: table.dbversion(),
            date: table.date().map(|d| d.to_string()),
            encoding: table.encoding_label(),
            memo_file: table.memo_name(),
            header,
            fields: table.fields(),
        };
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| DbfError::Format(format!("JSON serialization error: {}", e)))?;
        wprintln!(writer, "{}", json)?;
        return Ok(());
    }

    wprintln!(writer, "{}", "DBF Table".bold())?;
    wprintln!(writer, "  File:        {}", table.filename())?;
    wprintln!(writer, "  Name:        {}", table.name())?;
    wprintln!(
        writer,
        "  Version:     0x{:02x} ({})",
        header.dbversion,
        table.dbversion()
    )?;
    match table.date() {
        Some(date) => wprintln!(writer, "  Updated:     {}", date)?,
        None => wprintln!(writer, "  Updated:     {}", "invalid".yellow())?,
    }
    wprintln!(writer, "  Records:     {}", header.numrecords)?;
    wprintln!(writer, "  Header len:  {}", header.headerlen)?;
    wprintln!(writer, "  Record len:  {}", header.recordlen)?;
    wprintln!(
        writer,
        "  Encoding:    {} (driver 0x{:02x})",
        table.encoding_label(),
        header.language_driver
    )?;
    if let Some(memo) = table.memo_name() {
        wprintln!(writer, "  Memo file:   {}", memo)?;
    }
    if header.encryption_flag != 0 {
        wprintln!(writer, "  {}", "Encrypted (dBase IV)".red())?;
    }
    if header.incomplete_transaction != 0 {
        wprintln!(writer, "  {}", "Incomplete transaction".yellow())?;
    }
    wprintln!(writer)?;

    wprintln!(
        writer,
        "{}",
        format!(
            "  {:<3} {:<16} {:<4} {:>6} {:>4} {:>7}",
            "#", "Name", "Type", "Length", "Dec", "Offset"
        )
        .bold()
    )?;
    for (i, field) in table.fields().iter().enumerate() {
        wprint!(
            writer,
            "  {:<3} {:<16} {:<4} {:>6} {:>4} {:>7}",
            i + 1,
            field.name,
            field.field_type,
            field.length,
            field.decimal_count,
            field.offset + 1
        )?;
        if field.name != field.name_real {
            wprint!(writer, "  (on disk: {})", field.name_real)?;
        }
        wprintln!(writer)?;
    }

    Ok(())
}
