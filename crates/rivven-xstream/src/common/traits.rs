//! Source and configuration traits
//!
//! [`CdcSource`] is the lifecycle surface of a running capture;
//! [`CdcConfig`] is what callers may inspect and log about its settings.

use crate::common::Result;
use async_trait::async_trait;

/// Lifecycle of a streaming change source
#[async_trait]
pub trait CdcSource: Send + Sync {
    /// Start capturing changes on a background worker.
    async fn start(&mut self) -> Result<()>;

    /// Signal the worker to stop.
    ///
    /// A worker blocked inside a native receive call finishes that call
    /// before it observes the signal.
    async fn stop(&mut self) -> Result<()>;

    /// `true` while the worker is running.
    async fn is_healthy(&self) -> bool;
}

/// Source configuration
pub trait CdcConfig: Send + Sync {
    /// Source type name, e.g. `"oracle"`
    fn source_type(&self) -> &'static str;

    /// Connect string with credentials redacted
    fn connection_string(&self) -> &str;

    fn validate(&self) -> Result<()>;
}
