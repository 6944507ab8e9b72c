//! LCR receive protocol
//!
//! Drives one attached XStream Out session: receive an LCR, read its header,
//! translate its position to an SCN, decode the row images, drain chunked
//! column data and hand back a [`Message`].
//!
//! ```text
//!              receive_one()
//!   Idle ──────────────────────► Receiving
//!    ▲                              │
//!    │        record complete       ├── more row data ──► Continuation
//!    ├──────────────────────────────┤                         │
//!    │                              │ ◄───── last chunk ──────┘
//!    │                              ▼
//!    └────────── next call ──── Failed (native / decode error)
//! ```
//!
//! The native LCR handle is released exactly once per receive call, on every
//! exit path, through a scoped guard.

use super::codepage::CodepageRegistry;
use super::column::{ColumnDecoder, Row};
use super::message::{LcrCommand, Message};
use super::position::{LcrIdVersion, PositionCorrelator};
use super::scn::Scn;
use super::session::{native_error, CallStatus, LcrGuard, LcrReceive, RowImage, XStreamOutbound};
use crate::common::{CdcError, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where the protocol stands after the last call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    /// Ready for the next receive
    Idle,
    /// Blocked in or processing a receive
    Receiving,
    /// Draining chunked column data of the current record
    Continuation,
    /// The last receive failed
    Failed,
}

/// Column data collected across chunk receives.
struct PendingChunk {
    column: String,
    data_type: u16,
    csid: u16,
    data: Vec<u8>,
}

/// LCR receive state machine over one session.
pub struct LcrProtocol<S: XStreamOutbound> {
    session: S,
    correlator: PositionCorrelator,
    decoder: ColumnDecoder,
    state: ReceiveState,
}

impl<S: XStreamOutbound> LcrProtocol<S> {
    /// Wrap an attached session. Text is decoded with `codepages`, defaulting
    /// to the session character set.
    pub fn new(session: S, version: LcrIdVersion, codepages: Arc<CodepageRegistry>) -> Self {
        let decoder = ColumnDecoder::new(codepages.clone(), session.charset_id());
        Self {
            session,
            correlator: PositionCorrelator::new(version).with_codepages(codepages),
            decoder,
            state: ReceiveState::Idle,
        }
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn correlator(&self) -> &PositionCorrelator {
        &self.correlator
    }

    pub fn decoder(&self) -> &ColumnDecoder {
        &self.decoder
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Receive the next message.
    ///
    /// Blocks until the source delivers an LCR or an idle low-water mark.
    /// Returns `Ok(None)` for records that do not map to a message (DDL,
    /// unknown command types). Errors are not retried.
    pub fn receive_one(&mut self) -> Result<Option<Message>> {
        self.state = ReceiveState::Receiving;
        let result = self.receive_inner();
        self.state = if result.is_ok() {
            ReceiveState::Idle
        } else {
            ReceiveState::Failed
        };
        result
    }

    fn receive_inner(&mut self) -> Result<Option<Message>> {
        let Self {
            session,
            correlator,
            decoder,
            state,
        } = self;

        let LcrReceive {
            lcr,
            status,
            more_row_data,
            fetch_lwm,
        } = session.receive_lcr();
        let mut guard = LcrGuard::new(session, lcr);
        let (session, lcr) = guard.split();

        match status {
            CallStatus::StillExecuting => {
                let built = read_record(session, correlator, decoder, lcr);
                if !more_row_data {
                    return built;
                }

                // Chunks are drained even when the record failed, so the
                // session stays in step for the next receive
                *state = ReceiveState::Continuation;
                let chunks = drain_chunks(session, decoder);
                let mut message = built?;
                let chunks = chunks?;
                match message.as_mut().and_then(Message::data_row_mut) {
                    Some(row) => merge_chunks(row, decoder, chunks)?,
                    None if !chunks.is_empty() => {
                        debug!("Discarded chunk data for {} columns", chunks.len());
                    }
                    None => {}
                }
                Ok(message)
            }
            CallStatus::Success => {
                let scn = correlator.position_to_scn(session, &fetch_lwm)?;
                trace!("Idle receive, low-water mark SCN {}", scn);
                Ok(Some(Message::Heartbeat { scn }))
            }
            status => Err(native_error(
                session,
                decoder.codepages(),
                "OCIXStreamOutLCRReceive",
                status,
            )),
        }
    }

    /// Report `scn` as processed so the source can release earlier state.
    ///
    /// Must be called with non-decreasing SCNs; a stale value is rejected by
    /// the source, not here.
    pub fn set_watermark(&mut self, scn: Scn) -> Result<()> {
        let position = self.correlator.scn_to_position(&mut self.session, scn)?;
        let status = self.session.set_processed_lwm(&position);
        if !status.is_success() {
            return Err(native_error(
                &mut self.session,
                self.decoder.codepages(),
                "OCIXStreamOutProcessedLWMSet",
                status,
            ));
        }
        debug!("Processed low-water mark set to SCN {}", scn);
        Ok(())
    }
}

impl<S: XStreamOutbound + std::fmt::Debug> std::fmt::Debug for LcrProtocol<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcrProtocol")
            .field("session", &self.session)
            .field("version", &self.correlator.version())
            .field("state", &self.state)
            .finish()
    }
}

/// Read the header and row images of a record that carries an LCR.
fn read_record<S>(
    session: &mut S,
    correlator: &PositionCorrelator,
    decoder: &ColumnDecoder,
    lcr: &S::Lcr,
) -> Result<Option<Message>>
where
    S: XStreamOutbound + ?Sized,
{
    let header = session.lcr_header(lcr).map_err(|status| {
        native_error(session, decoder.codepages(), "OCILCRHeaderGet", status)
    })?;
    let scn = correlator.position_to_scn(session, &header.position)?;
    let command = LcrCommand::parse(&header.command_type);
    debug!("Received {} LCR at SCN {}", command.as_str(), scn);

    let message = match command {
        LcrCommand::Commit => Message::Commit { scn },
        LcrCommand::Insert => Message::Insert {
            scn,
            owner: String::from_utf8_lossy(&header.owner).into_owned(),
            table: decoder.decode_text(&header.object_name, 0)?,
            columns: read_row(session, decoder, lcr, RowImage::New)?,
        },
        LcrCommand::Delete => Message::Delete {
            scn,
            owner: String::from_utf8_lossy(&header.owner).into_owned(),
            table: decoder.decode_text(&header.object_name, 0)?,
            columns: read_row(session, decoder, lcr, RowImage::Old)?,
        },
        LcrCommand::Update => {
            let owner = String::from_utf8_lossy(&header.owner).into_owned();
            let table = decoder.decode_text(&header.object_name, 0)?;
            let old_columns = read_row(session, decoder, lcr, RowImage::Old)?;
            let new_columns = read_row(session, decoder, lcr, RowImage::New)?;
            Message::Update {
                scn,
                owner,
                table,
                old_columns,
                new_columns,
            }
        }
        LcrCommand::Other(tag) => {
            warn!("Skipping LCR with command type {:?} at SCN {}", tag, scn);
            return Ok(None);
        }
    };
    Ok(Some(message))
}

fn read_row<S>(session: &mut S, decoder: &ColumnDecoder, lcr: &S::Lcr, image: RowImage) -> Result<Row>
where
    S: XStreamOutbound + ?Sized,
{
    let columns = session.row_columns(lcr, image).map_err(|status| {
        native_error(session, decoder.codepages(), "OCILCRRowColumnInfoGet", status)
    })?;
    decoder.decode_row(columns)
}

/// Receive chunks until the source clears the more-data flag. Payloads are
/// concatenated per column in arrival order.
fn drain_chunks<S>(session: &mut S, decoder: &ColumnDecoder) -> Result<Vec<PendingChunk>>
where
    S: XStreamOutbound + ?Sized,
{
    let mut pending: Vec<PendingChunk> = Vec::new();
    loop {
        let chunk = session.receive_chunk().map_err(|status| {
            native_error(session, decoder.codepages(), "OCIXStreamOutChunkReceive", status)
        })?;
        trace!(
            "Chunk for column {} ({} bytes, more: {})",
            chunk.column_name,
            chunk.data.len(),
            chunk.more_row_data
        );
        match pending.iter().position(|p| p.column == chunk.column_name) {
            Some(i) => pending[i].data.extend_from_slice(&chunk.data),
            None => pending.push(PendingChunk {
                column: chunk.column_name,
                data_type: chunk.data_type,
                csid: chunk.csid,
                data: chunk.data.to_vec(),
            }),
        }
        if !chunk.more_row_data {
            return Ok(pending);
        }
    }
}

/// Replace (or append) chunked columns in the row with their full value.
fn merge_chunks(row: &mut Row, decoder: &ColumnDecoder, chunks: Vec<PendingChunk>) -> Result<()> {
    for chunk in chunks {
        let value = decoder
            .decode_chunk(&chunk.data, chunk.csid, chunk.data_type)
            .map_err(|e| match e {
                CdcError::Config(_) => e,
                other => CdcError::decode(format!("column {}: {}", chunk.column, other)),
            })?;
        debug!("Merged {} bytes of chunk data into column {}", chunk.data.len(), chunk.column);
        row.set(chunk.column, value);
    }
    Ok(())
}
