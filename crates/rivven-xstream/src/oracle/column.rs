//! Column value decoding
//!
//! Row LCRs carry each column as a `(name, SQLT tag, csid, bytes)` tuple.
//! [`ColumnDecoder`] turns those into typed [`ColumnValue`]s:
//!
//! | Tag                          | Value                         |
//! |------------------------------|-------------------------------|
//! | `SQLT_CHR` (1), `SQLT_AFC` (96) | [`ColumnValue::Text`]      |
//! | `SQLT_LNG` (8), `SQLT_CLOB` (112) | [`ColumnValue::Text`]    |
//! | `SQLT_VNU` (6)               | [`ColumnValue::Integer`]      |
//! | `SQLT_ODT` (156)             | [`ColumnValue::Date`]         |
//! | anything else                | [`ColumnValue::Null`]         |
//!
//! A zero-length value is always `Null`. Supporting another type means adding
//! a [`SqlType`] variant and one match arm in [`ColumnDecoder::decode`].
//!
//! Chunked (LOB/LONG) data goes through [`ColumnDecoder::decode_chunk`]: only
//! character tags become text, binary LOB data is `Null`.

use super::codepage::CodepageRegistry;
use super::number::Number;
use super::session::ColumnDescriptor;
use crate::common::{CdcError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// OCI external data type tags handled by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// `SQLT_CHR`: variable-length character string
    Char,
    /// `SQLT_AFC`: fixed-length character string
    FixedChar,
    /// `SQLT_LNG`: LONG character data
    Long,
    /// `SQLT_CLOB`: character LOB (also NCLOB)
    Clob,
    /// `SQLT_VNU`: NUMBER with preceding length byte
    VarNum,
    /// `SQLT_ODT`: OCIDate
    Date,
    /// Not decoded
    Other(u16),
}

impl SqlType {
    pub fn from_u16(tag: u16) -> Self {
        match tag {
            1 => SqlType::Char,
            96 => SqlType::FixedChar,
            8 => SqlType::Long,
            112 => SqlType::Clob,
            6 => SqlType::VarNum,
            156 => SqlType::Date,
            other => SqlType::Other(other),
        }
    }

    /// Character data, decoded through the code-page registry.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            SqlType::Char | SqlType::FixedChar | SqlType::Long | SqlType::Clob
        )
    }
}

/// Size of the native `OCIDate` struct.
const OCI_DATE_SIZE: usize = 7;

/// Calendar date and time of day, second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OracleDate {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl OracleDate {
    /// Read an `OCIDate`: little-endian `i16` year, then month, day, hour,
    /// minute and second bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < OCI_DATE_SIZE {
            return Err(CdcError::decode(format!(
                "OCIDate needs {} bytes, got {}",
                OCI_DATE_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            year: i16::from_le_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
            second: bytes[6],
        })
    }

    /// `None` when the fields do not form a valid calendar date/time.
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?.and_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
    }
}

impl fmt::Display for OracleDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Decoded column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Date(OracleDate),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&OracleDate> {
        match self {
            ColumnValue::Date(d) => Some(d),
            _ => None,
        }
    }

    /// JSON form; dates render as `YYYY-MM-DD HH:MM:SS`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ColumnValue::Text(s) => serde_json::Value::String(s.clone()),
            ColumnValue::Integer(v) => serde_json::Value::from(*v),
            ColumnValue::Date(d) => serde_json::Value::String(d.to_string()),
            ColumnValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Text(s) => f.write_str(s),
            ColumnValue::Integer(v) => write!(f, "{}", v),
            ColumnValue::Date(d) => write!(f, "{}", d),
            ColumnValue::Null => f.write_str("NULL"),
        }
    }
}

/// One row image: column names and values in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, ColumnValue)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Value of the first column with this name.
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace the value of `name`, or append it when the row has no such column.
    pub fn set(&mut self, name: impl Into<String>, value: ColumnValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, ColumnValue);
    type IntoIter = std::vec::IntoIter<(String, ColumnValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Maps raw column values to [`ColumnValue`]s.
#[derive(Debug, Clone)]
pub struct ColumnDecoder {
    codepages: Arc<CodepageRegistry>,
    /// Session character set, used for csid 0
    default_csid: u16,
}

impl ColumnDecoder {
    pub fn new(codepages: Arc<CodepageRegistry>, default_csid: u16) -> Self {
        Self {
            codepages,
            default_csid,
        }
    }

    pub fn codepages(&self) -> &Arc<CodepageRegistry> {
        &self.codepages
    }

    pub fn default_csid(&self) -> u16 {
        self.default_csid
    }

    fn effective_csid(&self, csid: u16) -> u16 {
        if csid == 0 {
            self.default_csid
        } else {
            csid
        }
    }

    /// Decode one value.
    ///
    /// An unregistered code page on a text column fails with
    /// [`CdcError::Config`].
    pub fn decode(&self, value: &[u8], csid: u16, data_type: u16) -> Result<ColumnValue> {
        if value.is_empty() {
            return Ok(ColumnValue::Null);
        }
        match SqlType::from_u16(data_type) {
            SqlType::Char | SqlType::FixedChar | SqlType::Long | SqlType::Clob => {
                Ok(ColumnValue::Text(self.decode_text(value, csid)?))
            }
            SqlType::VarNum => {
                let number = Number::from_bytes(value)?;
                Ok(ColumnValue::Integer(number.to_i64()?))
            }
            SqlType::Date => Ok(ColumnValue::Date(OracleDate::from_bytes(value)?)),
            SqlType::Other(_) => Ok(ColumnValue::Null),
        }
    }

    /// Decode reassembled chunk data.
    ///
    /// Character tags become [`ColumnValue::Text`]; binary LOB data and every
    /// other tag decode to `Null`.
    pub fn decode_chunk(&self, bytes: &[u8], csid: u16, data_type: u16) -> Result<ColumnValue> {
        if bytes.is_empty() || !SqlType::from_u16(data_type).is_text() {
            return Ok(ColumnValue::Null);
        }
        Ok(ColumnValue::Text(self.decode_text(bytes, csid)?))
    }

    /// Decode text in the given character set (0 = session character set).
    pub fn decode_text(&self, bytes: &[u8], csid: u16) -> Result<String> {
        self.codepages.decode(self.effective_csid(csid), bytes)
    }

    /// Decode a whole row image, keeping column order.
    pub fn decode_row(&self, columns: Vec<ColumnDescriptor>) -> Result<Row> {
        let mut row = Row::with_capacity(columns.len());
        for column in columns {
            let value = self
                .decode(&column.value, column.csid, column.data_type)
                .map_err(|e| match e {
                    CdcError::Config(_) => e,
                    other => CdcError::decode(format!("column {}: {}", column.name, other)),
                })?;
            row.0.push((column.name, value));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::codepage::{CODEPAGE_AL16UTF16, CODEPAGE_AL32UTF8};

    fn decoder() -> ColumnDecoder {
        ColumnDecoder::new(
            Arc::new(CodepageRegistry::with_defaults()),
            CODEPAGE_AL32UTF8,
        )
    }

    #[test]
    fn test_sql_type_tags() {
        assert_eq!(SqlType::from_u16(1), SqlType::Char);
        assert_eq!(SqlType::from_u16(96), SqlType::FixedChar);
        assert_eq!(SqlType::from_u16(6), SqlType::VarNum);
        assert_eq!(SqlType::from_u16(156), SqlType::Date);
        assert_eq!(SqlType::from_u16(112), SqlType::Clob);
        assert_eq!(SqlType::from_u16(23), SqlType::Other(23));
        assert!(SqlType::Long.is_text());
        assert!(!SqlType::VarNum.is_text());
        assert!(!SqlType::Other(113).is_text());
    }

    #[test]
    fn test_zero_length_is_null_for_every_tag() {
        let decoder = decoder();
        for tag in [1u16, 6, 8, 96, 112, 156, 23, 0] {
            assert_eq!(decoder.decode(&[], 0, tag).unwrap(), ColumnValue::Null);
        }
    }

    #[test]
    fn test_text() {
        let decoder = decoder();
        assert_eq!(
            decoder.decode("Zürich".as_bytes(), 0, 1).unwrap(),
            ColumnValue::Text("Zürich".to_string())
        );
        assert_eq!(
            decoder
                .decode(&[0x4F, 0x00, 0x4B, 0x00], CODEPAGE_AL16UTF16, 96)
                .unwrap(),
            ColumnValue::Text("OK".to_string())
        );
    }

    #[test]
    fn test_unregistered_codepage_is_fatal() {
        let err = decoder().decode(b"abc", 9999, 1).unwrap_err();
        assert!(matches!(err, CdcError::Config(_)));
        assert!(err.to_string().contains("9999"));
    }

    #[test]
    fn test_integer() {
        let decoder = decoder();
        let bytes = Number::from_i64(-12345).as_bytes().to_vec();
        assert_eq!(
            decoder.decode(&bytes, 0, 6).unwrap(),
            ColumnValue::Integer(-12345)
        );
        assert!(matches!(
            decoder.decode(&[9, 0xC1], 0, 6),
            Err(CdcError::Number(_))
        ));
    }

    #[test]
    fn test_date() {
        let bytes = [0xE8, 0x07, 3, 15, 13, 45, 30];
        let value = decoder().decode(&bytes, 0, 156).unwrap();
        let date = value.as_date().unwrap();
        assert_eq!(date.year, 2024);
        assert_eq!(date.to_string(), "2024-03-15 13:45:30");
        let dt = date.to_naive_datetime().unwrap();
        assert_eq!(dt.to_string(), "2024-03-15 13:45:30");

        assert!(matches!(
            decoder().decode(&bytes[..5], 0, 156),
            Err(CdcError::Decode(_))
        ));
    }

    #[test]
    fn test_invalid_calendar_date() {
        let date = OracleDate::from_bytes(&[0xE8, 0x07, 2, 30, 0, 0, 0]).unwrap();
        assert!(date.to_naive_datetime().is_none());
    }

    #[test]
    fn test_unsupported_type_is_null() {
        assert_eq!(
            decoder().decode(&[1, 2, 3], 0, 23).unwrap(),
            ColumnValue::Null
        );
    }

    #[test]
    fn test_decode_chunk_by_type() {
        let decoder = decoder();
        assert_eq!(
            decoder.decode_chunk(b"long text", 0, 112).unwrap(),
            ColumnValue::Text("long text".to_string())
        );
        assert_eq!(
            decoder.decode_chunk(b"legacy", 0, 8).unwrap(),
            ColumnValue::Text("legacy".to_string())
        );
        // JPEG header is not valid UTF-8; binary tags must not reach the text decoder
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(decoder.decode_chunk(&jpeg, 0, 23).unwrap(), ColumnValue::Null);
        assert_eq!(decoder.decode_chunk(&jpeg, 0, 113).unwrap(), ColumnValue::Null);
        assert_eq!(decoder.decode_chunk(&[], 0, 1).unwrap(), ColumnValue::Null);
        assert!(matches!(
            decoder.decode_chunk(&jpeg, 0, 1),
            Err(CdcError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_row_keeps_order() {
        let columns = vec![
            ColumnDescriptor::new("ID", 6, 0, Number::from_i64(7).as_bytes().to_vec()),
            ColumnDescriptor::new("NAME", 1, 0, b"ann".to_vec()),
            ColumnDescriptor::new("NOTE", 1, 0, Vec::new()),
        ];
        let row = decoder().decode_row(columns).unwrap();
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["ID", "NAME", "NOTE"]);
        assert_eq!(row.get("ID"), Some(&ColumnValue::Integer(7)));
        assert!(row.get("NOTE").unwrap().is_null());
        assert_eq!(
            row.to_json(),
            serde_json::json!({"ID": 7, "NAME": "ann", "NOTE": null})
        );
    }

    #[test]
    fn test_decode_row_names_failing_column() {
        let columns = vec![ColumnDescriptor::new("BAD", 1, 0, vec![0xFF, 0xFE])];
        let err = decoder().decode_row(columns).unwrap_err();
        assert!(matches!(err, CdcError::Decode(_)));
        assert!(err.to_string().contains("BAD"));
    }

    #[test]
    fn test_row_set_replaces_or_appends() {
        let mut row: Row = vec![("A".to_string(), ColumnValue::Integer(1))]
            .into_iter()
            .collect();
        row.set("A", ColumnValue::Text("x".to_string()));
        row.set("B", ColumnValue::Null);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("A").and_then(|v| v.as_text()), Some("x"));
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"A":"x","B":null}"#
        );
    }
}
