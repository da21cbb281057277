//! Shared utilities (case-insensitive file lookup, hex dump formatting).

pub mod fs;
pub mod hex;
