//! Test harness for XStream integration tests
//!
//! Provides an in-memory, scripted XStream Out session:
//! - Scripted LCRs, idle receives and receive errors
//! - Chunked column data per record
//! - Counters for receives, chunk receives and LCR frees
//! - Captured watermark submissions

#![allow(dead_code)]

pub mod assertions;
pub mod session;

pub use assertions::MessageVecExt;
pub use session::{
    bad_position, position, position_scn, col_date, col_int, col_text, RecordSpec,
    ScriptedConnector, ScriptedSession, SessionStats,
};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging (idempotent)
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("rivven_xstream=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}
