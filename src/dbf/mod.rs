//! DBF (dBase / xBase) table decoding.
//!
//! This module reads the on-disk structures of the dBase family of table
//! formats, FoxPro and Visual FoxPro included: the fixed table header, the
//! field descriptor block, the marker-prefixed row area and the companion
//! memo files, from a plain file, a buffer or a zip archive member.
//!
//! Start with [`table::Table`] to open a table, then iterate
//! [`table::Table::records`] or build your own row type with
//! [`table::Table::iter_with`].

pub mod archive;
pub mod codepage;
pub mod constants;
pub mod cursor;
pub mod field;
pub mod header;
pub mod memo;
pub mod record;
pub mod source;
pub mod table;
pub mod value;
