use std::io::Write;

use crate::cli::app::OpenArgs;
use crate::cli::{open_table, wprintln};
use crate::util::hex::{describe_marker, format_offset, hex_dump};
use crate::DbfError;

pub struct DumpOptions {
    pub open: OpenArgs,
    pub row: Option<u64>,
    pub binary: bool,
}

pub fn execute(opts: &DumpOptions, writer: &mut dyn Write) -> Result<(), DbfError> {
    let mut table = open_table(&opts.open, true)?;

    let (data, base_offset, title) = match opts.row {
        Some(row) => {
            let bytes = table.read_raw_row(row)?;
            let offset = table.row_offset(row)?;
            let marker = bytes.first().copied().unwrap_or(0);
            let title = format!(
                "Row {} at offset {} ({} bytes, marker {:?} {})",
                row,
                format_offset(offset),
                bytes.len(),
                char::from(marker),
                describe_marker(marker)
            );
            (bytes, offset, title)
        }
        None => {
            let bytes = table.read_header_block()?;
            let title = format!("Header block of {} ({} bytes)", table.filename(), bytes.len());
            (bytes, 0, title)
        }
    };

    if opts.binary {
        writer
            .write_all(&data)
            .map_err(|e| DbfError::Io(format!("Cannot write to output: {}", e)))?;
        return Ok(());
    }

    wprintln!(writer, "{}", title)?;
    wprintln!(writer)?;
    wprintln!(writer, "{}", hex_dump(&data, base_offset))?;
    Ok(())
}
