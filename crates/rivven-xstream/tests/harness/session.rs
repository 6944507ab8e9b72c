//! Scripted XStream Out session
//!
//! Positions produced here are one format byte (`1` = V1, `2` = V2) followed
//! by the `OCINumber` bytes of the SCN, so tests can read back which format
//! and SCN a watermark was submitted with.

use rivven_xstream::oracle::{
    CallStatus, ColumnDescriptor, LcrChunk, LcrHeader, LcrIdVersion, LcrReceive, NativeError,
    Number, Position, RowImage, XStreamConfig, XStreamConnector, XStreamOutbound,
    CODEPAGE_AL32UTF8,
};
use rivven_xstream::{CdcError, Result, Scn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const POSITION_V1: u8 = 1;
const POSITION_V2: u8 = 2;
/// First byte of a position the scripted session refuses to translate
const POSITION_BAD: u8 = 0xEE;

/// V2 position carrying `scn`
pub fn position(scn: u64) -> Position {
    let mut bytes = vec![POSITION_V2];
    bytes.extend_from_slice(Number::from_u64(scn).as_bytes());
    Position::from(bytes)
}

/// Position the session fails to translate
pub fn bad_position() -> Position {
    Position::from(vec![POSITION_BAD, 0x00])
}

/// SCN embedded in a harness position
pub fn position_scn(position: &Position) -> Scn {
    let number = Number::from_bytes(&position.as_bytes()[1..]).unwrap();
    Scn::new(number.to_u64().unwrap())
}

pub fn col_text(name: &str, value: &str) -> ColumnDescriptor {
    ColumnDescriptor::new(name, 1, 0, value.as_bytes().to_vec())
}

pub fn col_int(name: &str, value: i64) -> ColumnDescriptor {
    ColumnDescriptor::new(name, 6, 0, Number::from_i64(value).as_bytes().to_vec())
}

pub fn col_date(name: &str, year: i16, month: u8, day: u8) -> ColumnDescriptor {
    let [y0, y1] = year.to_le_bytes();
    ColumnDescriptor::new(name, 156, 0, vec![y0, y1, month, day, 0, 0, 0])
}

/// One scripted LCR
#[derive(Debug, Clone)]
pub struct RecordSpec {
    pub command: String,
    pub owner: String,
    pub table: Vec<u8>,
    pub position: Position,
    pub old: Vec<ColumnDescriptor>,
    pub new: Vec<ColumnDescriptor>,
    pub chunks: Vec<LcrChunk>,
    pub fail_header: bool,
    pub fail_image: Option<RowImage>,
    pub fail_chunk_at: Option<usize>,
}

impl RecordSpec {
    pub fn new(command: &str, scn: u64) -> Self {
        Self {
            command: command.to_string(),
            owner: String::new(),
            table: Vec::new(),
            position: position(scn),
            old: Vec::new(),
            new: Vec::new(),
            chunks: Vec::new(),
            fail_header: false,
            fail_image: None,
            fail_chunk_at: None,
        }
    }

    pub fn table(mut self, owner: &str, table: &str) -> Self {
        self.owner = owner.to_string();
        self.table = table.as_bytes().to_vec();
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn old(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.old = columns;
        self
    }

    pub fn new_image(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.new = columns;
        self
    }

    /// Character chunks (`SQLT_CHR`), delivered in order; all but the last
    /// carry the more-data flag
    pub fn chunks(self, chunks: &[(&str, &[u8])]) -> Self {
        let typed: Vec<(&str, u16, &[u8])> = chunks
            .iter()
            .map(|(column, data)| (*column, 1u16, *data))
            .collect();
        self.typed_chunks(&typed)
    }

    /// Chunks with an explicit `SQLT_*` tag per chunk
    pub fn typed_chunks(mut self, chunks: &[(&str, u16, &[u8])]) -> Self {
        let last = chunks.len().saturating_sub(1);
        self.chunks = chunks
            .iter()
            .enumerate()
            .map(|(i, (column, data_type, data))| LcrChunk {
                column_name: column.to_string(),
                data_type: *data_type,
                csid: 0,
                data: data.to_vec().into(),
                more_row_data: i < last,
            })
            .collect();
        self
    }

    pub fn fail_header(mut self) -> Self {
        self.fail_header = true;
        self
    }

    pub fn fail_image(mut self, image: RowImage) -> Self {
        self.fail_image = Some(image);
        self
    }

    pub fn fail_chunk_at(mut self, index: usize) -> Self {
        self.fail_chunk_at = Some(index);
        self
    }
}

#[derive(Debug)]
enum Step {
    Record(RecordSpec),
    Idle(Position),
    Error { code: i32, text: String },
}

/// Call counters shared with the test
#[derive(Debug, Default)]
pub struct SessionStats {
    pub receives: AtomicUsize,
    pub chunk_receives: AtomicUsize,
    pub frees: AtomicUsize,
    /// Submitted watermarks as (format byte, SCN)
    pub watermarks: Mutex<Vec<(u8, Scn)>>,
}

impl SessionStats {
    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }

    pub fn watermarks(&self) -> Vec<(u8, Scn)> {
        self.watermarks.lock().unwrap().clone()
    }
}

/// In-memory XStream Out session driven by a script
#[derive(Debug)]
pub struct ScriptedSession {
    steps: VecDeque<Step>,
    records: HashMap<u64, RecordSpec>,
    chunks: VecDeque<LcrChunk>,
    chunk_index: usize,
    fail_chunk_at: Option<usize>,
    next_id: u64,
    charset: u16,
    /// Delay for receives once the script is exhausted
    idle_delay: Duration,
    idle_position: Position,
    fail_watermarks: bool,
    last_error: NativeError,
    stats: Arc<SessionStats>,
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            records: HashMap::new(),
            chunks: VecDeque::new(),
            chunk_index: 0,
            fail_chunk_at: None,
            next_id: 1,
            charset: CODEPAGE_AL32UTF8,
            idle_delay: Duration::from_millis(5),
            idle_position: Position::empty(),
            fail_watermarks: false,
            last_error: NativeError {
                code: 0,
                text: Default::default(),
            },
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn charset(mut self, csid: u16) -> Self {
        self.charset = csid;
        self
    }

    pub fn fail_watermarks(mut self) -> Self {
        self.fail_watermarks = true;
        self
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    pub fn record(mut self, record: RecordSpec) -> Self {
        self.steps.push_back(Step::Record(record));
        self
    }

    pub fn commit(self, scn: u64) -> Self {
        self.record(RecordSpec::new("COMMIT", scn))
    }

    pub fn insert(self, scn: u64, owner: &str, table: &str, new: Vec<ColumnDescriptor>) -> Self {
        self.record(RecordSpec::new("INSERT", scn).table(owner, table).new_image(new))
    }

    pub fn delete(self, scn: u64, owner: &str, table: &str, old: Vec<ColumnDescriptor>) -> Self {
        self.record(RecordSpec::new("DELETE", scn).table(owner, table).old(old))
    }

    pub fn update(
        self,
        scn: u64,
        owner: &str,
        table: &str,
        old: Vec<ColumnDescriptor>,
        new: Vec<ColumnDescriptor>,
    ) -> Self {
        self.record(
            RecordSpec::new("UPDATE", scn)
                .table(owner, table)
                .old(old)
                .new_image(new),
        )
    }

    /// Idle receive returning a low-water mark at `scn`
    pub fn idle(mut self, scn: u64) -> Self {
        self.steps.push_back(Step::Idle(position(scn)));
        self
    }

    /// Idle receive returning an empty low-water mark
    pub fn idle_empty(mut self) -> Self {
        self.steps.push_back(Step::Idle(Position::empty()));
        self
    }

    pub fn error(mut self, code: i32, text: &str) -> Self {
        self.steps.push_back(Step::Error {
            code,
            text: text.to_string(),
        });
        self
    }

    fn fail(&mut self, code: i32, text: &str) -> CallStatus {
        self.last_error = NativeError {
            code,
            text: text.as_bytes().to_vec().into(),
        };
        CallStatus::Error
    }

    fn record_for(&self, lcr: &u64) -> &RecordSpec {
        self.records
            .get(lcr)
            .unwrap_or_else(|| panic!("LCR {} not live", lcr))
    }
}

impl XStreamOutbound for ScriptedSession {
    type Lcr = u64;

    fn charset_id(&self) -> u16 {
        self.charset
    }

    fn receive_lcr(&mut self) -> LcrReceive<u64> {
        self.stats.receives.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id;
        self.next_id += 1;

        match self.steps.pop_front() {
            Some(Step::Record(record)) => {
                let more_row_data = !record.chunks.is_empty();
                self.chunks = record.chunks.iter().cloned().collect();
                self.chunk_index = 0;
                self.fail_chunk_at = record.fail_chunk_at;
                self.records.insert(id, record);
                LcrReceive {
                    lcr: id,
                    status: CallStatus::StillExecuting,
                    more_row_data,
                    fetch_lwm: Position::empty(),
                }
            }
            Some(Step::Idle(lwm)) => {
                self.idle_position = lwm.clone();
                LcrReceive {
                    lcr: id,
                    status: CallStatus::Success,
                    more_row_data: false,
                    fetch_lwm: lwm,
                }
            }
            Some(Step::Error { code, text }) => {
                let status = self.fail(code, &text);
                LcrReceive {
                    lcr: id,
                    status,
                    more_row_data: false,
                    fetch_lwm: Position::empty(),
                }
            }
            None => {
                std::thread::sleep(self.idle_delay);
                LcrReceive {
                    lcr: id,
                    status: CallStatus::Success,
                    more_row_data: false,
                    fetch_lwm: self.idle_position.clone(),
                }
            }
        }
    }

    fn lcr_header(&mut self, lcr: &u64) -> std::result::Result<LcrHeader, CallStatus> {
        let record = self.record_for(lcr).clone();
        if record.fail_header {
            return Err(self.fail(26_914, "ORA-26914: header unavailable"));
        }
        Ok(LcrHeader {
            command_type: record.command,
            owner: record.owner.into_bytes().into(),
            object_name: record.table.into(),
            position: record.position,
        })
    }

    fn row_columns(
        &mut self,
        lcr: &u64,
        image: RowImage,
    ) -> std::result::Result<Vec<ColumnDescriptor>, CallStatus> {
        let record = self.record_for(lcr).clone();
        if record.fail_image == Some(image) {
            return Err(self.fail(1_403, "ORA-01403: no data found"));
        }
        Ok(match image {
            RowImage::Old => record.old,
            RowImage::New => record.new,
        })
    }

    fn receive_chunk(&mut self) -> std::result::Result<LcrChunk, CallStatus> {
        self.stats.chunk_receives.fetch_add(1, Ordering::SeqCst);
        let index = self.chunk_index;
        self.chunk_index += 1;
        if self.fail_chunk_at == Some(index) {
            return Err(self.fail(22_275, "ORA-22275: invalid LOB locator"));
        }
        match self.chunks.pop_front() {
            Some(chunk) => Ok(chunk),
            None => Err(self.fail(26_800, "no chunk pending")),
        }
    }

    fn set_processed_lwm(&mut self, position: &Position) -> CallStatus {
        if self.fail_watermarks {
            return self.fail(26_701, "ORA-26701: STREAMS process does not exist");
        }
        self.stats
            .watermarks
            .lock()
            .unwrap()
            .push((position.as_bytes()[0], position_scn(position)));
        CallStatus::Success
    }

    fn position_to_number(&mut self, position: &Position) -> std::result::Result<Number, CallStatus> {
        if position.as_bytes()[0] == POSITION_BAD {
            return Err(self.fail(26_857, "ORA-26857: invalid position"));
        }
        Number::from_bytes(&position.as_bytes()[1..])
            .map_err(|_| CallStatus::Other(-1))
    }

    fn number_to_position(
        &mut self,
        number: &Number,
        version: LcrIdVersion,
    ) -> std::result::Result<Position, CallStatus> {
        let format = match version {
            LcrIdVersion::V1 => POSITION_V1,
            LcrIdVersion::V2 => POSITION_V2,
        };
        let mut bytes = vec![format];
        bytes.extend_from_slice(number.as_bytes());
        Ok(Position::from(bytes))
    }

    fn free_lcr(&mut self, lcr: &u64) {
        self.stats.frees.fetch_add(1, Ordering::SeqCst);
        self.records.remove(lcr);
    }

    fn last_error(&mut self) -> NativeError {
        self.last_error.clone()
    }
}

/// Hands out one scripted session
pub struct ScriptedConnector {
    session: Mutex<Option<ScriptedSession>>,
    fail: Option<String>,
    attached: Mutex<Option<String>>,
}

impl ScriptedConnector {
    pub fn new(session: ScriptedSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            fail: None,
            attached: Mutex::new(None),
        }
    }

    /// Connector whose attach fails
    pub fn failing(message: &str) -> Self {
        Self {
            session: Mutex::new(Some(ScriptedSession::new())),
            fail: Some(message.to_string()),
            attached: Mutex::new(None),
        }
    }

    /// Outbound server the session was attached to
    pub fn attached_server(&self) -> Option<String> {
        self.attached.lock().unwrap().clone()
    }
}

impl XStreamConnector for ScriptedConnector {
    type Session = ScriptedSession;

    fn open_session(&self, _config: &XStreamConfig) -> Result<ScriptedSession> {
        self.session
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| CdcError::invalid_state("session already opened"))
    }

    fn attach(&self, _session: &mut ScriptedSession, server_name: &str) -> Result<()> {
        if let Some(ref message) = self.fail {
            return Err(CdcError::native("OCIXStreamOutAttach", 26_804, message.clone()));
        }
        *self.attached.lock().unwrap() = Some(server_name.to_string());
        Ok(())
    }
}
