//! Code-page text decoding
//!
//! Oracle identifies character sets by numeric id (`852` = ZHS16GBK,
//! `873` = AL32UTF8, `2000` = AL16UTF16, ...). The registry is built once when the session is
//! set up and is read-only afterwards; share it as `Arc<CodepageRegistry>`.
//!
//! ```rust
//! use rivven_xstream::oracle::{CodepageRegistry, TextDecodeError};
//!
//! let registry = CodepageRegistry::builder()
//!     .with_defaults()
//!     .register(31, |bytes: &[u8]| -> Result<String, TextDecodeError> {
//!         Ok(bytes.iter().map(|&b| b as char).collect())
//!     })
//!     .build();
//!
//! assert!(registry.contains(31));
//! assert!(registry.contains(873));
//! ```

use crate::common::{CdcError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Raw bytes, no validation beyond lossy UTF-8.
pub const CODEPAGE_RAW: u16 = 0;
/// ZHS16GBK
pub const CODEPAGE_ZHS16GBK: u16 = 852;
/// AL32UTF8
pub const CODEPAGE_AL32UTF8: u16 = 873;
/// AL16UTF16
pub const CODEPAGE_AL16UTF16: u16 = 2000;

/// Text could not be decoded with the selected code page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("code page {codepage}: {reason}")]
pub struct TextDecodeError {
    pub codepage: u16,
    pub reason: String,
}

impl TextDecodeError {
    pub fn new(codepage: u16, reason: impl Into<String>) -> Self {
        Self {
            codepage,
            reason: reason.into(),
        }
    }
}

/// Decodes raw column bytes into a string.
pub trait TextDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> std::result::Result<String, TextDecodeError>;
}

impl<F> TextDecoder for F
where
    F: Fn(&[u8]) -> std::result::Result<String, TextDecodeError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> std::result::Result<String, TextDecodeError> {
        self(bytes)
    }
}

fn decode_raw(bytes: &[u8]) -> std::result::Result<String, TextDecodeError> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_utf8(bytes: &[u8]) -> std::result::Result<String, TextDecodeError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| TextDecodeError::new(CODEPAGE_AL32UTF8, e.to_string()))
}

fn decode_gbk(bytes: &[u8]) -> std::result::Result<String, TextDecodeError> {
    encoding_rs::GBK
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| TextDecodeError::new(CODEPAGE_ZHS16GBK, "invalid GBK sequence"))
}

/// UTF-16 code units in little-endian order.
fn decode_utf16le(bytes: &[u8]) -> std::result::Result<String, TextDecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(TextDecodeError::new(
            CODEPAGE_AL16UTF16,
            format!("odd byte length {}", bytes.len()),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| TextDecodeError::new(CODEPAGE_AL16UTF16, e.to_string()))
}

/// Immutable map from code-page id to decoder.
#[derive(Clone, Default)]
pub struct CodepageRegistry {
    decoders: HashMap<u16, Arc<dyn TextDecoder>>,
}

impl CodepageRegistry {
    pub fn builder() -> CodepageRegistryBuilder {
        CodepageRegistryBuilder::default()
    }

    /// Registry with the raw, ZHS16GBK, AL32UTF8 and AL16UTF16 decoders.
    pub fn with_defaults() -> Self {
        Self::builder().with_defaults().build()
    }

    pub fn contains(&self, codepage: u16) -> bool {
        self.decoders.contains_key(&codepage)
    }

    /// Look up a decoder. A missing code page is a configuration error.
    pub fn decoder(&self, codepage: u16) -> Result<&dyn TextDecoder> {
        self.decoders
            .get(&codepage)
            .map(|d| d.as_ref())
            .ok_or_else(|| CdcError::config(format!("code page {} not registered", codepage)))
    }

    pub fn decode(&self, codepage: u16, bytes: &[u8]) -> Result<String> {
        Ok(self.decoder(codepage)?.decode(bytes)?)
    }
}

impl fmt::Debug for CodepageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("CodepageRegistry")
            .field("codepages", &ids)
            .finish()
    }
}

/// Builder for [`CodepageRegistry`]
#[derive(Default)]
pub struct CodepageRegistryBuilder {
    decoders: HashMap<u16, Arc<dyn TextDecoder>>,
}

impl CodepageRegistryBuilder {
    /// Add the raw, ZHS16GBK, AL32UTF8 and AL16UTF16 decoders.
    pub fn with_defaults(self) -> Self {
        self.register(CODEPAGE_RAW, decode_raw)
            .register(CODEPAGE_ZHS16GBK, decode_gbk)
            .register(CODEPAGE_AL32UTF8, decode_utf8)
            .register(CODEPAGE_AL16UTF16, decode_utf16le)
    }

    /// Register (or replace) the decoder for a code page.
    pub fn register(mut self, codepage: u16, decoder: impl TextDecoder + 'static) -> Self {
        self.decoders.insert(codepage, Arc::new(decoder));
        self
    }

    pub fn build(self) -> CodepageRegistry {
        CodepageRegistry {
            decoders: self.decoders,
        }
    }
}
