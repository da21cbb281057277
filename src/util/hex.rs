//! Hex dump formatting used by `xdbf dump`.

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Format a byte offset as "decimal (0xhex)".
pub fn format_offset(offset: u64) -> String {
    format!("{} (0x{:x})", offset, offset)
}

/// Name of a record marker byte.
pub fn describe_marker(marker: u8) -> &'static str {
    match marker {
        b' ' => "active",
        b'*' => "deleted",
        0x1A => "end of table",
        _ => "unknown",
    }
}

/// Classic hex dump of `data`, offsets starting at `base_offset`.
///
/// ```text
/// 00000000  03 7c 03 0f 02 00 00 00  41 00 0a 00 00 00 00 00  |.|......A.......|
/// ```
pub fn hex_dump(data: &[u8], base_offset: u64) -> String {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("{:08x}  ", base_offset + (i * BYTES_PER_LINE) as u64);
            for j in 0..BYTES_PER_LINE {
                if j == BYTES_PER_LINE / 2 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(b) => {
                        let _ = write!(line, "{:02x} ", b);
                    }
                    None => line.push_str("   "),
                }
            }
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            let _ = write!(line, " |{:<width$}|", ascii, width = BYTES_PER_LINE);
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
