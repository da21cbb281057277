#![cfg(feature = "cli")]
//! Integration tests for the `xdbf` subcommands.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;
use tempfile::NamedTempFile;

use dbf::cli::app::OpenArgs;
use dbf::cli::{count, dump, info, records};

/// NAME C5 + AGE I4 with two active rows and one deleted row.
fn people_file() -> NamedTempFile {
    let mut buf = vec![0u8; 32];
    buf[0] = 0x03;
    buf[1] = 124;
    buf[2] = 6;
    buf[3] = 30;
    LittleEndian::write_u32(&mut buf[4..8], 3);
    LittleEndian::write_u16(&mut buf[8..10], 97);
    LittleEndian::write_u16(&mut buf[10..12], 10);
    buf[29] = 0x57;
    for (name, field_type, length) in [("NAME", b'C', 5u8), ("AGE", b'I', 4u8)] {
        let mut d = vec![0u8; 32];
        d[..name.len()].copy_from_slice(name.as_bytes());
        d[11] = field_type;
        d[16] = length;
        buf.extend(d);
    }
    buf.push(b'\r');
    for (marker, name, age) in [(b' ', "John", 30i32), (b'*', "Ann", 41), (b' ', "Bo", 7)] {
        buf.push(marker);
        buf.extend(format!("{:<5}", name).as_bytes());
        buf.extend(age.to_le_bytes());
    }
    buf.push(0x1A);

    let mut tmp = tempfile::Builder::new().suffix(".dbf").tempfile().unwrap();
    tmp.write_all(&buf).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn open_args(file: &NamedTempFile) -> OpenArgs {
    OpenArgs {
        file: file.path().display().to_string(),
        encoding: None,
        replace_errors: false,
        lowernames: false,
        combined_names: false,
        no_rename: false,
        ignore_missing_memo: false,
        streaming: false,
        mmap: false,
        member: None,
        memo: None,
        case_sensitive: false,
    }
}

fn records_opts(file: &NamedTempFile) -> records::RecordsOptions {
    records::RecordsOptions {
        open: open_args(file),
        deleted: false,
        columns: None,
        limit: None,
        raw: false,
        convert_float: false,
        pretty: false,
    }
}

#[test]
fn test_info_text_lists_fields() {
    let file = people_file();
    let mut output = Vec::new();
    info::execute(
        &info::InfoOptions {
            open: open_args(&file),
            json: false,
        },
        &mut output,
    )
    .unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Records:     3"));
    assert!(text.contains("2024-06-30"));
    assert!(text.contains("NAME"));
    assert!(text.contains("AGE"));
}

#[test]
fn test_info_json() {
    let file = people_file();
    let mut output = Vec::new();
    info::execute(
        &info::InfoOptions {
            open: open_args(&file),
            json: true,
        },
        &mut output,
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["date"], "2024-06-30");
    assert_eq!(json["encoding"], "windows-1252");
    assert_eq!(json["fields"].as_array().unwrap().len(), 2);
    assert_eq!(json["fields"][1]["name"], "AGE");
    assert!(json.get("memo_file").is_none());
}

#[test]
fn test_records_json_lines() {
    let file = people_file();
    let mut output = Vec::new();
    records::execute(&records_opts(&file), &mut output).unwrap();
    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![r#"{"NAME":"John","AGE":30}"#, r#"{"NAME":"Bo","AGE":7}"#]
    );
}

#[test]
fn test_records_deleted_with_columns() {
    let file = people_file();
    let mut opts = records_opts(&file);
    opts.deleted = true;
    opts.columns = Some(vec!["AGE".to_string()]);
    let mut output = Vec::new();
    records::execute(&opts, &mut output).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "{\"AGE\":41}\n");
}

#[test]
fn test_records_limit_and_pretty() {
    let file = people_file();
    let mut opts = records_opts(&file);
    opts.limit = Some(1);
    opts.pretty = true;
    opts.open.lowernames = true;
    opts.open.streaming = true;
    let mut output = Vec::new();
    records::execute(&opts, &mut output).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "John");
}

#[test]
fn test_count_json() {
    let file = people_file();
    let mut output = Vec::new();
    count::execute(
        &count::CountOptions {
            open: open_args(&file),
            json: true,
        },
        &mut output,
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["active"], 2);
    assert_eq!(json["deleted"], 1);
    assert_eq!(json["header_records"], 3);
}

#[test]
fn test_count_text_without_mismatch_warning() {
    let file = people_file();
    let mut output = Vec::new();
    count::execute(
        &count::CountOptions {
            open: open_args(&file),
            json: false,
        },
        &mut output,
    )
    .unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Active:   2"));
    assert!(text.contains("Deleted:  1"));
    assert!(!text.contains("differs"));
}

#[test]
fn test_dump_row_binary() {
    let file = people_file();
    let mut output = Vec::new();
    dump::execute(
        &dump::DumpOptions {
            open: open_args(&file),
            row: Some(1),
            binary: true,
        },
        &mut output,
    )
    .unwrap();
    assert_eq!(output.len(), 10);
    assert_eq!(output[0], b'*');
    assert_eq!(&output[1..6], b"Ann  ");
}

#[test]
fn test_dump_header_hex() {
    let file = people_file();
    let mut output = Vec::new();
    dump::execute(
        &dump::DumpOptions {
            open: open_args(&file),
            row: None,
            binary: false,
        },
        &mut output,
    )
    .unwrap();
    let text = String::from_utf8(output).unwrap();
    assert!(text.starts_with("Header block of"));
    assert!(text.contains("(97 bytes)"));
}

#[test]
fn test_dump_row_out_of_range() {
    let file = people_file();
    let mut output = Vec::new();
    let result = dump::execute(
        &dump::DumpOptions {
            open: open_args(&file),
            row: Some(10),
            binary: false,
        },
        &mut output,
    );
    assert!(result.is_err());
}

#[test]
fn test_dump_huge_row_index_errors() {
    let file = people_file();
    let mut output = Vec::new();
    let result = dump::execute(
        &dump::DumpOptions {
            open: open_args(&file),
            row: Some(u64::MAX / 4),
            binary: true,
        },
        &mut output,
    );
    assert!(result.is_err());
    assert!(output.is_empty());
}

#[test]
fn test_missing_file_errors() {
    let file = people_file();
    let mut args = open_args(&file);
    args.file.push_str(".missing");
    let mut output = Vec::new();
    let result = count::execute(&count::CountOptions { open: args, json: false }, &mut output);
    assert!(result.is_err());
}
