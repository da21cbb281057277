//! DBF table reading toolkit.
//!
//! The `xbase-utils` crate (library name `dbf`) provides Rust types and
//! functions for decoding dBase, FoxPro and Visual FoxPro tables (`.dbf`)
//! with their memo files (`.fpt`, `.dbt`), from disk, from memory or from
//! inside a zip archive.
//!
//! # CLI Reference
//!
//! Install the `xdbf` binary and use its subcommands to work with DBF
//! files from the command line.
//!
//! ## Subcommands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`xdbf info`](cli::app::Commands::Info) | Header, dialect, encoding, memo file and field table |
//! | [`xdbf records`](cli::app::Commands::Records) | Stream records as JSON |
//! | [`xdbf count`](cli::app::Commands::Count) | Count active and deleted records without decoding |
//! | [`xdbf dump`](cli::app::Commands::Dump) | Hex dump of the header block or a physical row |
//! | [`xdbf completions`](cli::app::Commands::Completions) | Generate shell completion scripts |
//!
//! ## Global options
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`
//! and `-v` (repeatable) to raise the log level.
//!
//! See the [`cli`] module for full details.
//!
//! # Library API
//!
//! ```toml
//! [dependencies]
//! dbf = { package = "xbase-utils", version = "0.3", default-features = false }
//! ```
//!
//! ## Quick example
//!
//! ```no_run
//! use dbf::dbf::cursor::{RecordKind, RecordQuery};
//! use dbf::dbf::table::{DbfOptions, Table};
//!
//! let options = DbfOptions {
//!     lowernames: true,
//!     ..DbfOptions::default()
//! };
//! let mut table = Table::open_with("archive.zip", options)?;
//! println!("{} records in {}", table.count(RecordKind::Active)?, table.name());
//!
//! let query = RecordQuery::new().columns(["name", "price"]).nrows(10);
//! for row in table.iter_with(RecordKind::Active, query, |items| items)? {
//!     println!("{:?}", row?);
//! }
//! # Ok::<(), dbf::DbfError>(())
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`dbf::table`] | Open tables, options, record views, lifecycle |
//! | [`dbf::source`] | Byte sources over files, buffers, mmaps and zip members |
//! | [`dbf::archive`] | Zip containers and member name resolution |
//! | [`dbf::header`] | 32-byte table header |
//! | [`dbf::field`] | Field descriptors, renaming and validation |
//! | [`dbf::cursor`] | Streaming record cursor and marker counting |
//! | [`dbf::value`] | Field values and the pluggable field parser |
//! | [`dbf::memo`] | FoxPro and dBase memo files |
//! | [`dbf::codepage`] | Language driver code pages and text decoding |
//! | [`dbf::record`] | Ordered record type |
//! | [`dbf::constants`] | Header, descriptor and marker constants |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `xdbf` binary and enables memory-mapped reads. |

#[cfg(feature = "cli")]
pub mod cli;
pub mod dbf;
pub mod util;

use thiserror::Error;

/// Errors returned by `dbf` operations.
#[derive(Error, Debug)]
pub enum DbfError {
    /// An I/O error occurred on an existing resource (read, seek or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A table file, memo file or archive member could not be located.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed binary data (short header, bad field definition, invalid value).
    #[error("Format error: {0}")]
    Format(String),

    /// Text could not be decoded under the strict policy.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An invalid argument was supplied (unknown encoding, out-of-range row, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The table or byte source was used after `close()`.
    #[error("Table is closed")]
    Closed,
}
