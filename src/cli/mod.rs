//! CLI subcommand implementations for the `xdbf` binary.
//!
//! CLI argument parsing uses clap derive macros, with the top-level
//! [`app::Cli`] struct and [`app::Commands`] enum defined in [`app`] and
//! shared between `main.rs` and `build.rs` (for man pages and shell
//! completions) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a
//! `pub fn execute(opts, writer) -> Result<(), DbfError>` entry point. The
//! `writer: &mut dyn Write` parameter lets tests capture output and the
//! global `--output` flag redirect it to a file.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `xdbf info` | [`info`] | Header fields, dialect, date, encoding, memo file and field table |
//! | `xdbf records` | [`records`] | Records as JSON lines or a pretty JSON array |
//! | `xdbf count` | [`count`] | Active and deleted record counts from row markers |
//! | `xdbf dump` | [`dump`] | Hex dump of the header block or one physical row |
//!
//! Every subcommand takes the same table-opening flags ([`app::OpenArgs`]):
//! `--encoding`, `--replace-errors`, `--lowernames`, `--combined-names`,
//! `--no-rename`, `--ignore-missing-memo`, `--streaming`, `--mmap`,
//! `--member`, `--memo` and `--case-sensitive`. The `wprintln!` and
//! `wprint!` macros wrap `writeln!`/`write!` to convert `io::Error` into
//! `DbfError`.

pub mod app;
pub mod count;
pub mod dump;
pub mod info;
pub mod records;

/// Write a line to the given writer, converting io::Error to DbfError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::DbfError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::DbfError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to DbfError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::DbfError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use crate::dbf::codepage::DecodeErrors;
use crate::dbf::table::{DbfOptions, Table};
use crate::DbfError;
use app::OpenArgs;

/// Translate the shared table flags into [`DbfOptions`].
pub(crate) fn table_options(args: &OpenArgs, raw: bool) -> DbfOptions {
    DbfOptions {
        encoding: args.encoding.clone(),
        ignore_case: !args.case_sensitive,
        lowernames: args.lowernames,
        raw,
        ignore_missing_memofile: args.ignore_missing_memo,
        char_decode_errors: if args.replace_errors {
            DecodeErrors::Replace
        } else {
            DecodeErrors::Strict
        },
        combined_names: args.combined_names,
        rename_duplicates: !args.no_rename,
        read_to_memory: !args.streaming,
        use_mmap: args.mmap,
        member: args.member.clone(),
        memo: args.memo.clone(),
        ..DbfOptions::default()
    }
}

/// Open the table named by `args`.
pub(crate) fn open_table(args: &OpenArgs, raw: bool) -> Result<Table, DbfError> {
    Table::open_with(args.file.as_str(), table_options(args, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_table_options_from_flags() {
        let cli = app::Cli::parse_from([
            "xdbf",
            "records",
            "t.dbf",
            "--lowernames",
            "--no-rename",
            "--streaming",
            "--replace-errors",
            "--case-sensitive",
            "--encoding",
            "cp866",
        ]);
        let app::Commands::Records { open, .. } = cli.command else {
            panic!("expected records subcommand");
        };
        let opts = table_options(&open, true);
        assert!(opts.lowernames);
        assert!(!opts.rename_duplicates);
        assert!(!opts.read_to_memory);
        assert!(!opts.ignore_case);
        assert!(opts.raw);
        assert_eq!(opts.char_decode_errors, DecodeErrors::Replace);
        assert_eq!(opts.encoding.as_deref(), Some("cp866"));
    }

    #[test]
    fn test_default_flags_match_library_defaults() {
        let cli = app::Cli::parse_from(["xdbf", "count", "t.dbf"]);
        let app::Commands::Count { open, .. } = cli.command else {
            panic!("expected count subcommand");
        };
        let opts = table_options(&open, false);
        let defaults = DbfOptions::default();
        assert_eq!(opts.ignore_case, defaults.ignore_case);
        assert_eq!(opts.read_to_memory, defaults.read_to_memory);
        assert_eq!(opts.rename_duplicates, defaults.rename_duplicates);
    }
}
