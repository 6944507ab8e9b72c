//! Native XStream Out boundary
//!
//! The client never links the vendor library itself. An adapter implements
//! [`XStreamOutbound`] on top of the OCI XStream calls
//! (`OCIXStreamOutLCRReceive`, `OCILCRHeaderGet`, `OCIXStreamOutChunkReceive`,
//! `OCIXStreamOutProcessedLWMSet`, ...) and [`XStreamConnector`] on top of
//! session setup and `OCIXStreamOutAttach`.
//!
//! Primitives report failure as a bare [`CallStatus`]; the protocol then asks
//! [`XStreamOutbound::last_error`] for the native code and text, the same way
//! OCI pairs a `sword` status with `OCIErrorGet`.

use super::codepage::CodepageRegistry;
use super::number::Number;
use super::position::{LcrIdVersion, Position};
use crate::common::{CdcError, Result};
use bytes::Bytes;

/// Status returned by a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// `OCI_SUCCESS`
    Success,
    /// `OCI_STILL_EXECUTING`: an LCR is available
    StillExecuting,
    /// `OCI_ERROR`
    Error,
    /// Any other status code
    Other(i32),
}

impl CallStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CallStatus::Success)
    }
}

/// Outcome of one LCR receive call.
#[derive(Debug)]
pub struct LcrReceive<L> {
    /// Native record handle; always released through `free_lcr`
    pub lcr: L,
    pub status: CallStatus,
    /// `OCI_XSTREAM_MORE_ROW_DATA`: chunked column data follows
    pub more_row_data: bool,
    /// Low-water-mark position returned with an idle (heartbeat) receive
    pub fetch_lwm: Position,
}

/// Header fields of an LCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcrHeader {
    /// Command type: `INSERT`, `UPDATE`, `DELETE`, `COMMIT`, ...
    pub command_type: String,
    pub owner: Bytes,
    /// Object name, encoded in the session character set
    pub object_name: Bytes,
    pub position: Position,
}

/// Which row image to read from a row LCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowImage {
    /// `OCI_LCR_ROW_COLVAL_OLD`
    Old,
    /// `OCI_LCR_ROW_COLVAL_NEW`
    New,
}

/// One column of a row image as returned by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// `SQLT_*` data type tag
    pub data_type: u16,
    /// Character set id; 0 = session character set
    pub csid: u16,
    /// Raw value bytes; empty = NULL
    pub value: Bytes,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: u16, csid: u16, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data_type,
            csid,
            value: value.into(),
        }
    }
}

/// One piece of chunked (LOB/LONG) column data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcrChunk {
    pub column_name: String,
    pub data_type: u16,
    pub csid: u16,
    pub data: Bytes,
    /// More chunks follow for this LCR
    pub more_row_data: bool,
}

/// Native error details fetched after a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    /// Error text in the session character set
    pub text: Bytes,
}

/// Primitive calls of an attached XStream Out session.
///
/// Implementations are driven from a single worker thread and may block in
/// [`receive_lcr`](Self::receive_lcr) until the source has data.
pub trait XStreamOutbound {
    /// Native LCR handle.
    type Lcr;

    /// Database character set id (`NLS_CHARACTERSET`).
    fn charset_id(&self) -> u16;

    /// Blocking receive of the next LCR or an idle low-water mark.
    fn receive_lcr(&mut self) -> LcrReceive<Self::Lcr>;

    fn lcr_header(&mut self, lcr: &Self::Lcr) -> std::result::Result<LcrHeader, CallStatus>;

    fn row_columns(
        &mut self,
        lcr: &Self::Lcr,
        image: RowImage,
    ) -> std::result::Result<Vec<ColumnDescriptor>, CallStatus>;

    fn receive_chunk(&mut self) -> std::result::Result<LcrChunk, CallStatus>;

    /// Report the processed low-water mark.
    fn set_processed_lwm(&mut self, position: &Position) -> CallStatus;

    /// Extract the SCN number embedded in a position.
    fn position_to_number(&mut self, position: &Position) -> std::result::Result<Number, CallStatus>;

    /// Build a position for an SCN in the given LCR id format.
    fn number_to_position(
        &mut self,
        number: &Number,
        version: LcrIdVersion,
    ) -> std::result::Result<Position, CallStatus>;

    /// Release a record handle returned by `receive_lcr`.
    fn free_lcr(&mut self, lcr: &Self::Lcr);

    /// Details of the most recent failure.
    fn last_error(&mut self) -> NativeError;
}

/// Opens and attaches XStream Out sessions.
pub trait XStreamConnector: Send + Sync + 'static {
    type Session: XStreamOutbound + Send + 'static;

    /// Log on with the configured credentials.
    fn open_session(&self, config: &super::source::XStreamConfig) -> Result<Self::Session>;

    /// Attach the session to the outbound server `server_name`.
    fn attach(&self, session: &mut Self::Session, server_name: &str) -> Result<()>;
}

/// Releases an LCR handle when dropped.
pub(crate) struct LcrGuard<'a, S: XStreamOutbound + ?Sized> {
    session: &'a mut S,
    lcr: S::Lcr,
}

impl<'a, S: XStreamOutbound + ?Sized> LcrGuard<'a, S> {
    pub(crate) fn new(session: &'a mut S, lcr: S::Lcr) -> Self {
        Self { session, lcr }
    }

    pub(crate) fn split(&mut self) -> (&mut S, &S::Lcr) {
        (&mut *self.session, &self.lcr)
    }
}

impl<S: XStreamOutbound + ?Sized> Drop for LcrGuard<'_, S> {
    fn drop(&mut self) {
        self.session.free_lcr(&self.lcr);
    }
}

/// Build a [`CdcError::Native`] from the session's last error.
///
/// The error text is decoded with the session character set, falling back
/// to lossy UTF-8 when that character set is not registered or the text is
/// not valid in it.
pub(crate) fn native_error<S>(
    session: &mut S,
    codepages: &CodepageRegistry,
    call: &'static str,
    status: CallStatus,
) -> CdcError
where
    S: XStreamOutbound + ?Sized,
{
    let err = session.last_error();
    let mut message = codepages
        .decode(session.charset_id(), &err.text)
        .unwrap_or_else(|_| String::from_utf8_lossy(&err.text).into_owned());
    if message.is_empty() {
        message = format!("status {:?}", status);
    }
    CdcError::native(call, err.code, message)
}
