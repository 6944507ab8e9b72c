//! System Change Number
//!
//! An SCN is Oracle's 64-bit logical timestamp. Its canonical text form splits
//! the value into 32-bit halves rendered as uppercase hex without padding:
//! `0x5_0000_3039` becomes `5/3039`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// SCN text parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScnParseError {
    /// Not two `/`-separated segments
    #[error("Invalid SCN format: {0:?}")]
    InvalidFormat(String),
    /// A segment is not a 32-bit hexadecimal value
    #[error("Invalid SCN digits: {0:?}")]
    InvalidDigits(String),
}

/// Oracle System Change Number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scn(u64);

impl Scn {
    pub const ZERO: Scn = Scn(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Build from high and low 32-bit halves.
    pub const fn from_parts(hi: u32, lo: u32) -> Self {
        Self(((hi as u64) << 32) | lo as u64)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Upper 32 bits.
    pub const fn hi(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Lower 32 bits.
    pub const fn lo(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse the `HI/LO` text form. Hex digits are case-insensitive.
    pub fn parse(s: &str) -> Result<Self, ScnParseError> {
        let mut segments = s.split('/');
        let (hi, lo) = match (segments.next(), segments.next(), segments.next()) {
            (Some(hi), Some(lo), None) => (hi, lo),
            _ => return Err(ScnParseError::InvalidFormat(s.to_string())),
        };
        Ok(Self::from_parts(parse_half(hi)?, parse_half(lo)?))
    }
}

fn parse_half(segment: &str) -> Result<u32, ScnParseError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ScnParseError::InvalidDigits(segment.to_string()));
    }
    u32::from_str_radix(segment, 16).map_err(|_| ScnParseError::InvalidDigits(segment.to_string()))
}

impl fmt::Display for Scn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.hi(), self.lo())
    }
}

impl FromStr for Scn {
    type Err = ScnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for Scn {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Scn> for u64 {
    fn from(scn: Scn) -> Self {
        scn.0
    }
}

impl Serialize for Scn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Scn::parse(&s).map_err(serde::de::Error::custom)
    }
}
