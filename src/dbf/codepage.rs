//! Language driver to code page mapping and text decoding.
//!
//! Byte 29 of the table header names the code page the table was written
//! with. [`TextDecoder::for_driver`] maps it onto an `encoding_rs`
//! encoding through a static lookup. DOS OEM pages that `encoding_rs` does not implement
//! (cp437, cp850, ...) only decode their ASCII range: any other byte is a
//! [`DbfError::Decode`] under the strict policy and U+FFFD under replace.

use encoding_rs::Encoding;
use serde::Serialize;
use tracing::warn;

use crate::DbfError;

/// Policy applied when a byte sequence is invalid in the table encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DecodeErrors {
    /// Fail with [`DbfError::Decode`].
    #[default]
    Strict,
    /// Substitute U+FFFD for malformed sequences.
    Replace,
}

/// Result of a code page lookup.
#[derive(Debug, Clone, Copy)]
pub struct Codepage {
    /// Conventional code page name (e.g. `cp1252`).
    pub name: &'static str,
    /// Encoding used to decode text, if `encoding_rs` implements the page.
    pub encoding: Option<&'static Encoding>,
}

/// Look up the code page for a language driver byte.
pub fn codepage_for_driver(language_driver: u8) -> Option<Codepage> {
    let name = match language_driver {
        0x00 => "ascii",
        0x01 | 0x09 | 0x0B | 0x0D | 0x0F | 0x11 | 0x15 | 0x18 | 0x19 | 0x1B => "cp437",
        0x02 | 0x0A | 0x0E | 0x10 | 0x12 | 0x14 | 0x16 | 0x1A | 0x1D | 0x25 | 0x37 => "cp850",
        0x03 | 0x57 | 0x58 | 0x59 => "cp1252",
        0x04 => "mac_roman",
        0x08 | 0x17 | 0x66 => "cp865",
        0x13 | 0x7B => "cp932",
        0x1C | 0x6C => "cp863",
        0x1F | 0x22 | 0x23 | 0x40 | 0x64 | 0x87 => "cp852",
        0x24 => "cp860",
        0x26 | 0x65 => "cp866",
        0x4D | 0x7A => "cp936",
        0x4E | 0x79 => "cp949",
        0x4F | 0x78 => "cp950",
        0x50 | 0x7C => "cp874",
        0x67 => "cp861",
        0x6A | 0x86 => "cp737",
        0x6B | 0x88 => "cp857",
        0x7D => "cp1255",
        0x7E => "cp1256",
        0x96 => "mac_cyrillic",
        0x97 => "mac_latin2",
        0x98 => "mac_greek",
        0xC8 => "cp1250",
        0xC9 => "cp1251",
        0xCA => "cp1254",
        0xCB => "cp1253",
        0xCC => "cp1257",
        _ => return None,
    };

    let encoding = match name {
        "ascii" | "cp1252" => Some(encoding_rs::WINDOWS_1252),
        "mac_roman" => Some(encoding_rs::MACINTOSH),
        "mac_cyrillic" => Some(encoding_rs::X_MAC_CYRILLIC),
        "cp932" => Some(encoding_rs::SHIFT_JIS),
        "cp936" => Some(encoding_rs::GBK),
        "cp949" => Some(encoding_rs::EUC_KR),
        "cp950" => Some(encoding_rs::BIG5),
        "cp866" => Some(encoding_rs::IBM866),
        "cp874" => Some(encoding_rs::WINDOWS_874),
        "cp1250" => Some(encoding_rs::WINDOWS_1250),
        "cp1251" => Some(encoding_rs::WINDOWS_1251),
        "cp1253" => Some(encoding_rs::WINDOWS_1253),
        "cp1254" => Some(encoding_rs::WINDOWS_1254),
        "cp1255" => Some(encoding_rs::WINDOWS_1255),
        "cp1256" => Some(encoding_rs::WINDOWS_1256),
        "cp1257" => Some(encoding_rs::WINDOWS_1257),
        _ => None,
    };

    Some(Codepage { name, encoding })
}


/// Resolve a caller-supplied encoding label (`"utf-8"`, `"cp1251"`, `"latin1"`).
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, DbfError> {
    let normalized = label.trim().to_ascii_lowercase();
    let lookup = match normalized.strip_prefix("cp") {
        Some(num) if num.starts_with("125") || num == "874" => format!("windows-{}", num),
        Some("866") => "ibm866".to_string(),
        Some("932") => "shift_jis".to_string(),
        Some("936") => "gbk".to_string(),
        Some("949") => "euc-kr".to_string(),
        Some("950") => "big5".to_string(),
        _ => normalized,
    };
    Encoding::for_label(lookup.as_bytes())
        .ok_or_else(|| DbfError::Argument(format!("Unknown text encoding: {}", label)))
}

/// Decodes names and character data with a fixed encoding and error policy.
#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    encoding: &'static Encoding,
    errors: DecodeErrors,
    /// Code page with no decoder; only its ASCII range is trusted.
    ascii_only: Option<&'static str>,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding, errors: DecodeErrors) -> Self {
        Self {
            encoding,
            errors,
            ascii_only: None,
        }
    }

    /// Decoder for a table's language driver byte.
    pub fn for_driver(language_driver: u8, errors: DecodeErrors) -> Self {
        match codepage_for_driver(language_driver) {
            Some(Codepage {
                encoding: Some(enc),
                ..
            }) => Self::new(enc, errors),
            Some(Codepage { name, .. }) => {
                warn!(
                    language_driver,
                    codepage = name,
                    "code page not supported, only ASCII text will decode"
                );
                Self {
                    ascii_only: Some(name),
                    ..Self::new(encoding_rs::WINDOWS_1252, errors)
                }
            }
            None => {
                warn!(language_driver, "unknown language driver, decoding as windows-1252");
                Self::new(encoding_rs::WINDOWS_1252, errors)
            }
        }
    }

    /// Name shown to users: the encoding, or the unsupported code page.
    pub fn label(&self) -> String {
        match self.ascii_only {
            Some(page) => format!("{} (ASCII only)", page),
            None => self.encoding.name().to_string(),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn errors(&self) -> DecodeErrors {
        self.errors
    }

    /// Decode `data` to a `String` under the configured policy.
    pub fn decode(&self, data: &[u8]) -> Result<String, DbfError> {
        if let Some(page) = self.ascii_only {
            if !data.is_ascii() {
                return self.decode_ascii_only(page, data);
            }
        }
        match self.errors {
            DecodeErrors::Strict => self
                .encoding
                .decode_without_bom_handling_and_without_replacement(data)
                .map(|text| text.into_owned())
                .ok_or_else(|| {
                    DbfError::Decode(format!(
                        "Invalid {} byte sequence in {:02x?}",
                        self.encoding.name(),
                        data
                    ))
                }),
            DecodeErrors::Replace => {
                let (text, _) = self.encoding.decode_without_bom_handling(data);
                Ok(text.into_owned())
            }
        }
    }

    fn decode_ascii_only(&self, page: &str, data: &[u8]) -> Result<String, DbfError> {
        match self.errors {
            DecodeErrors::Strict => Err(DbfError::Decode(format!(
                "Code page {} is not supported, pass an explicit encoding to decode {:02x?}",
                page, data
            ))),
            DecodeErrors::Replace => Ok(data
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
                .collect()),
        }
    }
}
