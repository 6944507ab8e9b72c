//! # Oracle XStream Out CDC Source
//!
//! Change Data Capture client for Oracle XStream Out outbound servers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Oracle XStream Out Flow                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────┐    ┌──────────────┐    ┌─────────────────────┐    │
//! │  │ DML Ops  │───▶│ Redo Log     │───▶│ Capture + Outbound  │    │
//! │  │ (I/U/D)  │    │              │    │ Server (LCRs)       │    │
//! │  └──────────┘    └──────────────┘    └──────────┬──────────┘    │
//! │                                                  │              │
//! │     ┌────────────────────────────────────────────┘              │
//! │     ▼                                                           │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ XStreamOutbound (native adapter)                           │ │
//! │  └──────────────────────────┬─────────────────────────────────┘ │
//! │                             ▼                                   │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ LcrProtocol                                                │ │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐   │ │
//! │  │  │ Position ↔   │  │ Column       │  │ Chunk           │   │ │
//! │  │  │ SCN          │  │ Decoder      │  │ Reassembly      │   │ │
//! │  │  └──────────────┘  └──────────────┘  └─────────────────┘   │ │
//! │  └──────────────────────────┬─────────────────────────────────┘ │
//! │                             ▼                                   │
//! │        Message { Commit | Insert | Update | Delete | Heartbeat }│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Positions and SCNs
//!
//! | Concept | Type | Notes |
//! |---------|------|-------|
//! | Position | opaque bytes | source-defined, V1 (< 12) or V2 (≥ 12) layout |
//! | SCN | `u64` | text form `HI/LO`, e.g. `5/3039` |
//! | Number | 22-byte `OCINumber` | carries the SCN inside a position |
//!
//! The source is told how far the client has processed through the
//! low-water mark (`OCIXStreamOutProcessedLWMSet`); [`XStreamCdc`] submits it
//! on a fixed interval.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rivven_xstream::oracle::{XStreamCdc, XStreamConfig};
//!
//! let config = XStreamConfig::builder()
//!     .username("c##xstrmadmin")
//!     .password("secret")
//!     .database("dbhost:1521/ORCLCDB")
//!     .server_name("XOUT")
//!     .build()?;
//!
//! // `OciConnector` implements `XStreamConnector` on top of the OCI client.
//! let mut cdc = XStreamCdc::new(config, OciConnector::default());
//! let mut rx = cdc.take_event_receiver().unwrap();
//!
//! cdc.start().await?;
//!
//! while let Some(message) = rx.recv().await {
//!     println!("{}", message);
//! }
//! ```

mod codepage;
mod column;
mod message;
mod number;
mod position;
mod protocol;
mod scn;
mod session;
mod source;

pub use codepage::{
    CodepageRegistry, CodepageRegistryBuilder, TextDecodeError, TextDecoder, CODEPAGE_AL16UTF16,
    CODEPAGE_AL32UTF8, CODEPAGE_RAW, CODEPAGE_ZHS16GBK,
};
pub use column::{ColumnDecoder, ColumnValue, OracleDate, Row, SqlType};
pub use message::{LcrCommand, Message};
pub use number::{Number, NumberError, NUMBER_SIZE};
pub use position::{LcrIdVersion, Position, PositionCorrelator};
pub use protocol::{LcrProtocol, ReceiveState};
pub use scn::{Scn, ScnParseError};
pub use session::{
    CallStatus, ColumnDescriptor, LcrChunk, LcrHeader, LcrReceive, NativeError, RowImage,
    XStreamConnector, XStreamOutbound,
};
pub use source::{
    AckMode, ScnWatermark, XStreamCdc, XStreamConfig, XStreamConfigBuilder, XStreamMetrics,
    XStreamMetricsSnapshot,
};

// Re-export common types
pub use crate::common::{CdcConfig, CdcSource};
