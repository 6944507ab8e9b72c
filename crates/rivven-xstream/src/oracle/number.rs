//! Oracle NUMBER codec
//!
//! XStream hands numeric payloads (SCNs embedded in positions, `NUMBER`
//! column values) over as a 22-byte `OCINumber`:
//!
//! ```text
//! ┌────────┬──────────┬─────────────────────────────────────┐
//! │ byte 0 │  byte 1  │ bytes 2..22                         │
//! │ length │ exponent │ base-100 mantissa (≤ 20 digit pairs)│
//! └────────┴──────────┴─────────────────────────────────────┘
//! ```
//!
//! - `length` counts the exponent byte plus every mantissa byte that follows.
//! - The exponent byte is `0xC1 + e` where `e` is the base-100 exponent of the
//!   first digit pair. Its high bit is the sign: set = non-negative, clear =
//!   negative, in which case the whole byte is bit-complemented.
//! - Non-negative digit pairs are stored as `pair + 1`, negative ones as
//!   `0x65 - pair`. Negative values shorter than 20 pairs end with a `0x66`
//!   terminator so raw byte order matches numeric order.
//! - Zero is `[0x01, 0x80]`. A negative sign with no mantissa encodes -1e126.
//!
//! Only the integer part is decoded; fractional digit pairs are truncated.

use std::fmt;
use thiserror::Error;

/// Size of an `OCINumber` buffer.
pub const NUMBER_SIZE: usize = 22;

/// Maximum number of base-100 mantissa bytes.
const MAX_MANTISSA: usize = 20;

const EXPONENT_BIAS: u8 = 0xC1;
const NEGATIVE_DIGIT_BASE: u8 = 0x65;
const NEGATIVE_TERMINATOR: u8 = 0x66;

/// Errors raised while decoding a [`Number`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberError {
    /// Length or digit bytes violate the encoding
    #[error("Malformed number: {0}")]
    Malformed(String),
    /// Integer part does not fit the requested 64-bit type
    #[error("Number out of 64-bit range")]
    Overflow,
    /// Negative value requested as unsigned
    #[error("Negative number cannot be decoded as unsigned")]
    NegativeUnsigned,
}

/// Oracle packed-decimal number.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Number([u8; NUMBER_SIZE]);

impl Number {
    /// The canonical zero encoding.
    pub const ZERO: Number = Number([
        0x01, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ]);

    /// Parse a number from its native buffer.
    ///
    /// The buffer may be shorter than 22 bytes as long as it covers the
    /// declared length; trailing bytes past the length are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NumberError> {
        let len = match bytes.first() {
            Some(&len) => len as usize,
            None => return Err(NumberError::Malformed("empty buffer".to_string())),
        };
        if len == 0 || len > MAX_MANTISSA + 1 {
            return Err(NumberError::Malformed(format!("invalid length byte {}", len)));
        }
        if bytes.len() < len + 1 {
            return Err(NumberError::Malformed(format!(
                "truncated buffer: length byte {} but {} bytes",
                len,
                bytes.len()
            )));
        }

        let mut raw = [0u8; NUMBER_SIZE];
        raw[..=len].copy_from_slice(&bytes[..=len]);
        Ok(Self(raw))
    }

    /// Encode a signed integer.
    pub fn from_i64(value: i64) -> Self {
        Self::from_magnitude(value.unsigned_abs(), value < 0)
    }

    /// Encode an unsigned integer.
    pub fn from_u64(value: u64) -> Self {
        Self::from_magnitude(value, false)
    }

    /// Decode the integer part as a signed 64-bit value.
    pub fn to_i64(&self) -> Result<i64, NumberError> {
        let magnitude = self.magnitude()?;
        if self.is_negative() {
            if magnitude > i64::MAX as u64 + 1 {
                return Err(NumberError::Overflow);
            }
            // 2^63 maps onto i64::MIN
            Ok((magnitude as i64).wrapping_neg())
        } else {
            i64::try_from(magnitude).map_err(|_| NumberError::Overflow)
        }
    }

    /// Decode the integer part as an unsigned 64-bit value.
    ///
    /// Negative values are rejected unless their integer part is zero.
    pub fn to_u64(&self) -> Result<u64, NumberError> {
        if self.is_negative() {
            return match self.magnitude() {
                Ok(0) => Ok(0),
                Ok(_) | Err(NumberError::Overflow) => Err(NumberError::NegativeUnsigned),
                Err(e) => Err(e),
            };
        }
        self.magnitude()
    }

    /// The meaningful bytes: length byte, exponent and mantissa.
    pub fn as_bytes(&self) -> &[u8] {
        let len = (self.0[0] as usize).min(MAX_MANTISSA + 1);
        &self.0[..=len]
    }

    /// The full 22-byte native buffer.
    pub fn raw(&self) -> &[u8; NUMBER_SIZE] {
        &self.0
    }

    /// Sign bit of the exponent byte is clear.
    pub fn is_negative(&self) -> bool {
        self.0[1] & 0x80 == 0
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa().is_empty() && !self.is_negative()
    }

    /// Negative sign with an empty mantissa.
    pub fn is_negative_1e126(&self) -> bool {
        self.mantissa().is_empty() && self.is_negative()
    }

    /// Number of digit-pair bytes, excluding the negative terminator.
    pub fn mantissa_len(&self) -> usize {
        self.mantissa().len()
    }

    fn mantissa(&self) -> &[u8] {
        let count = (self.0[0] as usize).saturating_sub(1).min(MAX_MANTISSA);
        let mantissa = &self.0[2..2 + count];
        if self.is_negative() {
            if let Some((&NEGATIVE_TERMINATOR, digits)) = mantissa.split_last() {
                return digits;
            }
        }
        mantissa
    }

    /// Base-100 exponent of the first digit pair.
    fn exponent(&self) -> i16 {
        let byte = if self.is_negative() {
            !self.0[1]
        } else {
            self.0[1]
        };
        byte as i16 - EXPONENT_BIAS as i16
    }

    /// Absolute value of the integer part.
    fn magnitude(&self) -> Result<u64, NumberError> {
        let len = self.0[0] as usize;
        if len == 0 || len > MAX_MANTISSA + 1 {
            return Err(NumberError::Malformed(format!("invalid length byte {}", len)));
        }
        if self.is_zero() {
            return Ok(0);
        }
        if self.is_negative_1e126() {
            return Err(NumberError::Overflow);
        }

        let negative = self.is_negative();
        let mantissa = self.mantissa();
        let mut digits = Vec::with_capacity(mantissa.len());
        for &byte in mantissa {
            digits.push(decode_digit(byte, negative)?);
        }

        let exponent = self.exponent();
        if exponent < 0 {
            return Ok(0);
        }

        let mut acc: u64 = 0;
        for i in 0..=exponent as usize {
            let digit = digits.get(i).copied().unwrap_or(0);
            acc = acc
                .checked_mul(100)
                .and_then(|v| v.checked_add(digit as u64))
                .ok_or(NumberError::Overflow)?;
        }
        Ok(acc)
    }

    fn from_magnitude(magnitude: u64, negative: bool) -> Self {
        if magnitude == 0 {
            return Self::ZERO;
        }

        // Least significant pair first; u64 has at most 10 base-100 digits
        let mut pairs = [0u8; 10];
        let mut count = 0;
        let mut v = magnitude;
        while v != 0 {
            pairs[count] = (v % 100) as u8;
            v /= 100;
            count += 1;
        }
        let lowest = pairs[..count].iter().position(|&p| p != 0).unwrap_or(0);

        let mut raw = [0u8; NUMBER_SIZE];
        let mut n = 0;
        for &pair in pairs[lowest..count].iter().rev() {
            raw[2 + n] = encode_digit(pair, negative);
            n += 1;
        }
        if negative && n < MAX_MANTISSA {
            raw[2 + n] = NEGATIVE_TERMINATOR;
            n += 1;
        }

        let exponent = EXPONENT_BIAS + (count - 1) as u8;
        raw[1] = if negative { !exponent } else { exponent };
        raw[0] = (n + 1) as u8;
        Self(raw)
    }
}

fn decode_digit(byte: u8, negative: bool) -> Result<u8, NumberError> {
    let valid = if negative {
        (2..=NEGATIVE_DIGIT_BASE).contains(&byte)
    } else {
        (1..=100).contains(&byte)
    };
    if !valid {
        return Err(NumberError::Malformed(format!(
            "invalid mantissa byte 0x{:02x}",
            byte
        )));
    }
    Ok(if negative {
        NEGATIVE_DIGIT_BASE - byte
    } else {
        byte - 1
    })
}

fn encode_digit(pair: u8, negative: bool) -> u8 {
    if negative {
        NEGATIVE_DIGIT_BASE - pair
    } else {
        pair + 1
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({})", hex::encode(self.as_bytes()))
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl TryFrom<&[u8]> for Number {
    type Error = NumberError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<Number> for i64 {
    type Error = NumberError;

    fn try_from(number: Number) -> Result<Self, Self::Error> {
        number.to_i64()
    }
}

impl TryFrom<Number> for u64 {
    type Error = NumberError;

    fn try_from(number: Number) -> Result<Self, Self::Error> {
        number.to_u64()
    }
}
