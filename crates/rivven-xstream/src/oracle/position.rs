//! LCR positions and their SCN correlation
//!
//! A position is an opaque, source-defined byte token. The only thing the
//! client does with it is translate it to and from an [`Scn`] through the
//! session, using the embedded [`Number`] payload.
//!
//! Two position formats exist. Sources from release 12 onwards use the
//! `OCI_LCRID_V2` format; older ones use the V1 layout.

use super::codepage::CodepageRegistry;
use super::number::Number;
use super::scn::Scn;
use super::session::{native_error, XStreamOutbound};
use crate::common::Result;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Opaque LCR position.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Position(Bytes);

impl Position {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_hex())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Vec<u8>> for Position {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Position {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

/// LCR id (position) wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcrIdVersion {
    /// Pre-12 position format
    V1,
    /// `OCI_LCRID_V2`
    V2,
}

impl LcrIdVersion {
    /// Pick the format for a source server major version.
    pub fn for_server_version(major: u32) -> Self {
        if major >= 12 {
            LcrIdVersion::V2
        } else {
            LcrIdVersion::V1
        }
    }
}

/// Translates between positions and SCNs.
#[derive(Debug, Clone)]
pub struct PositionCorrelator {
    version: LcrIdVersion,
    /// Used to decode native error text
    codepages: Arc<CodepageRegistry>,
}

impl PositionCorrelator {
    pub fn new(version: LcrIdVersion) -> Self {
        Self {
            version,
            codepages: Arc::new(CodepageRegistry::with_defaults()),
        }
    }

    /// Decode native error text with this registry.
    pub fn with_codepages(mut self, codepages: Arc<CodepageRegistry>) -> Self {
        self.codepages = codepages;
        self
    }

    pub fn version(&self) -> LcrIdVersion {
        self.version
    }

    /// SCN embedded in a position. An empty position is SCN 0 and is not
    /// passed to the session.
    pub fn position_to_scn<S>(&self, session: &mut S, position: &Position) -> Result<Scn>
    where
        S: XStreamOutbound + ?Sized,
    {
        if position.is_empty() {
            return Ok(Scn::ZERO);
        }
        let number = session
            .position_to_number(position)
            .map_err(|status| {
                native_error(session, &self.codepages, "OCILCRSCNsFromPosition", status)
            })?;
        let scn = Scn::new(number.to_u64()?);
        trace!("Position {} -> SCN {}", position, scn);
        Ok(scn)
    }

    /// Position for an SCN in this correlator's format.
    pub fn scn_to_position<S>(&self, session: &mut S, scn: Scn) -> Result<Position>
    where
        S: XStreamOutbound + ?Sized,
    {
        let number = Number::from_u64(scn.value());
        let call = match self.version {
            LcrIdVersion::V1 => "OCILCRSCNToPosition",
            LcrIdVersion::V2 => "OCILCRSCNToPosition2",
        };
        let position = session
            .number_to_position(&number, self.version)
            .map_err(|status| native_error(session, &self.codepages, call, status))?;
        trace!("SCN {} -> position {}", scn, position);
        Ok(position)
    }
}
