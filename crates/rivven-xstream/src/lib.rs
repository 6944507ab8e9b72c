//! # rivven-xstream - Oracle XStream CDC for Rivven
//!
//! Change Data Capture from Oracle XStream Out outbound servers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ XStream Out server   │
//! │ (LCR stream)         │
//! └──────────┬───────────┘
//!            │ XStreamOutbound (native adapter)
//!            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ LcrProtocol: header, position → SCN, rows, chunks        │
//! └──────────────────────────────────────────────────────────┘
//!            │
//!            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ XStreamCdc (CdcSource): worker, watermark ticker         │
//! └──────────────────────────────────────────────────────────┘
//!            │
//!            ▼
//!   Message { Commit | Insert | Update | Delete | Heartbeat }
//! ```
//!
//! The crate does not link the Oracle client libraries. A native adapter
//! implements [`oracle::XStreamOutbound`] and [`oracle::XStreamConnector`];
//! everything above that boundary (the `NUMBER` codec, SCN handling, column
//! decoding, the receive state machine and the worker runtime) lives here.
//!
//! ## Public API Organization
//!
//! ### Tier 1: Core Types (crate root)
//! Essential types for consuming a stream - `XStreamCdc`, `XStreamConfig`,
//! `Message`, `Scn`, `CdcSource`.
//!
//! ### Tier 2: Codec and Protocol Types (`oracle` module)
//! `Number`, `PositionCorrelator`, `ColumnDecoder`, `LcrProtocol` and the
//! native boundary traits, for custom drivers and adapters.
//!
//! ### Tier 3: Shared Types (`common` module)
//! Error taxonomy and source/config traits.

pub mod common;
pub mod oracle;

// =============================================================================
// TIER 1: Core Types
// =============================================================================

pub use common::{CdcConfig, CdcError, CdcSource, ErrorCategory, Result};
pub use oracle::{
    AckMode, CodepageRegistry, ColumnValue, Message, Row, Scn, ScnWatermark, XStreamCdc,
    XStreamConfig, XStreamConnector, XStreamOutbound,
};
