//! Oracle XStream CDC source implementation
//!
//! Runs the LCR receive loop on a blocking worker thread and acknowledges the
//! processed SCN back to the outbound server on a fixed interval.
//!
//! ```text
//!  ┌──────────────┐  tick (coalesced)   ┌──────────────────────────┐
//!  │ ticker task  │ ──────────────────► │ worker (spawn_blocking)  │
//!  └──────────────┘                     │  receive_one()           │
//!                                       │  set_watermark(current)  │
//!  ┌──────────────┐   advance(scn)      └────────────┬─────────────┘
//!  │ ScnWatermark │ ◄────────────────────────────────┤
//!  └──────────────┘                                  ▼
//!                                         mpsc::Receiver<Message>
//! ```
//!
//! The session is owned by the worker thread; the ticker never touches it.

use super::codepage::CodepageRegistry;
use super::message::Message;
use super::position::LcrIdVersion;
use super::protocol::LcrProtocol;
use super::scn::Scn;
use super::session::XStreamConnector;
use crate::common::{CdcConfig, CdcError, CdcSource, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Recover the guard from a poisoned lock; the guarded data stays valid.
trait RwLockExt<T> {
    fn read_recovered(&self) -> RwLockReadGuard<'_, T>;
    fn write_recovered(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> RwLockExt<T> for RwLock<T> {
    fn read_recovered(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_recovered(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// XStream CDC metrics
///
/// Thread-safe counters updated by the worker.
/// Use [`XStreamCdc::metrics()`] to get a snapshot of current metrics.
#[derive(Default)]
pub struct XStreamMetrics {
    /// Messages handed to the event channel
    messages: AtomicU64,
    /// Commit messages
    commits: AtomicU64,
    /// Insert, update and delete messages
    row_changes: AtomicU64,
    /// Heartbeat messages
    heartbeats: AtomicU64,
    /// LCRs that produced no message
    skipped_records: AtomicU64,
    /// Successful watermark submissions
    watermark_submissions: AtomicU64,
    /// Failed watermark submissions
    watermark_failures: AtomicU64,
    /// Highest SCN received
    last_scn: AtomicU64,
    /// Last SCN acknowledged to the source
    acknowledged_scn: AtomicU64,
}

impl XStreamMetrics {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record_message(&self, message: &Message) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        match message {
            Message::Commit { .. } => self.commits.fetch_add(1, Ordering::Relaxed),
            Message::Heartbeat { .. } => self.heartbeats.fetch_add(1, Ordering::Relaxed),
            _ => self.row_changes.fetch_add(1, Ordering::Relaxed),
        };
        self.last_scn
            .fetch_max(message.scn().value(), Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped_records.fetch_add(1, Ordering::Relaxed);
    }

    fn record_watermark(&self, scn: Scn) {
        self.watermark_submissions.fetch_add(1, Ordering::Relaxed);
        self.acknowledged_scn.store(scn.value(), Ordering::Relaxed);
    }

    fn record_watermark_failure(&self) {
        self.watermark_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics snapshot
    pub fn snapshot(&self) -> XStreamMetricsSnapshot {
        XStreamMetricsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            row_changes: self.row_changes.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            skipped_records: self.skipped_records.load(Ordering::Relaxed),
            watermark_submissions: self.watermark_submissions.load(Ordering::Relaxed),
            watermark_failures: self.watermark_failures.load(Ordering::Relaxed),
            last_scn: Scn::new(self.last_scn.load(Ordering::Relaxed)),
            acknowledged_scn: Scn::new(self.acknowledged_scn.load(Ordering::Relaxed)),
        }
    }
}

/// Metrics snapshot for external export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XStreamMetricsSnapshot {
    pub messages: u64,
    pub commits: u64,
    pub row_changes: u64,
    pub heartbeats: u64,
    pub skipped_records: u64,
    pub watermark_submissions: u64,
    pub watermark_failures: u64,
    pub last_scn: Scn,
    pub acknowledged_scn: Scn,
}

// ============================================================================
// Watermark
// ============================================================================

/// Shared "last processed SCN".
///
/// Advancing is monotonic: a lower SCN never replaces a higher one.
#[derive(Debug, Clone, Default)]
pub struct ScnWatermark {
    scn: Arc<AtomicU64>,
}

impl ScnWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Scn {
        Scn::new(self.scn.load(Ordering::Acquire))
    }

    /// Raise the watermark to `scn`. Returns `true` if it moved.
    pub fn advance(&self, scn: Scn) -> bool {
        self.scn.fetch_max(scn.value(), Ordering::AcqRel) < scn.value()
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// When the watermark follows received messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// Every received message advances the watermark
    #[default]
    OnReceive,
    /// The consumer advances the watermark through [`ScnWatermark::advance`]
    Manual,
}

/// Oracle XStream CDC configuration
///
/// # Security Note
///
/// This struct implements a custom Debug that redacts the password field
/// to prevent accidental leakage to logs.
///
/// # Example
///
/// ```rust
/// use rivven_xstream::oracle::XStreamConfig;
/// use std::time::Duration;
///
/// let config = XStreamConfig::builder()
///     .username("c##xstrmadmin")
///     .password("secret")
///     .database("dbhost:1521/ORCLPDB1")
///     .server_name("XOUT")
///     .server_version(19)
///     .watermark_interval(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.server_name, "XOUT");
/// ```
#[derive(Clone)]
pub struct XStreamConfig {
    /// XStream administrator user
    pub username: String,
    /// Password for authentication
    pub password: Option<String>,
    /// Connect identifier (TNS alias or EZConnect string)
    pub database: String,
    /// Outbound server name
    pub server_name: String,
    /// Source database major version (default: 12)
    pub server_version: u32,
    /// Interval between watermark submissions (default: 10s)
    pub watermark_interval: Duration,
    /// Event buffer size (default: 10000)
    pub buffer_size: usize,
    /// Watermark acknowledgement mode (default: OnReceive)
    pub ack_mode: AckMode,
    /// Cached redacted connection string for trait compliance
    redacted_conn_str: String,
}

impl std::fmt::Debug for XStreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XStreamConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("server_name", &self.server_name)
            .field("server_version", &self.server_version)
            .field("watermark_interval", &self.watermark_interval)
            .field("buffer_size", &self.buffer_size)
            .field("ack_mode", &self.ack_mode)
            .field("redacted_conn_str", &self.redacted_conn_str)
            .finish()
    }
}

impl Default for XStreamConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            database: String::new(),
            server_name: String::new(),
            server_version: 12,
            watermark_interval: Duration::from_secs(10),
            buffer_size: 10_000,
            ack_mode: AckMode::OnReceive,
            redacted_conn_str: String::new(),
        }
    }
}

impl XStreamConfig {
    /// Create a new builder for XStreamConfig
    pub fn builder() -> XStreamConfigBuilder {
        XStreamConfigBuilder::default()
    }

    /// Position format for the configured server version.
    pub fn lcrid_version(&self) -> LcrIdVersion {
        LcrIdVersion::for_server_version(self.server_version)
    }

    /// `user/password@database` connect string
    pub fn connection_string(&self) -> String {
        match self.password {
            Some(ref pwd) => format!("{}/{}@{}", self.username, pwd, self.database),
            None => format!("{}@{}", self.username, self.database),
        }
    }

    /// Connect string with the password redacted, for logging
    pub fn redacted_connection_string(&self) -> String {
        match self.password {
            Some(_) => format!("{}/[REDACTED]@{}", self.username, self.database),
            None => format!("{}@{}", self.username, self.database),
        }
    }
}

impl CdcConfig for XStreamConfig {
    fn source_type(&self) -> &'static str {
        "oracle"
    }

    fn connection_string(&self) -> &str {
        &self.redacted_conn_str
    }

    fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(CdcError::config("Username is required"));
        }
        if self.database.is_empty() {
            return Err(CdcError::config("Database is required"));
        }
        if self.server_name.is_empty() {
            return Err(CdcError::config("Outbound server name is required"));
        }
        if self.watermark_interval.is_zero() {
            return Err(CdcError::config("Watermark interval must be > 0"));
        }
        if self.buffer_size == 0 {
            return Err(CdcError::config("Buffer size must be > 0"));
        }
        Ok(())
    }
}

/// Builder for XStreamConfig
#[derive(Default)]
pub struct XStreamConfigBuilder {
    config: XStreamConfig,
}

impl XStreamConfigBuilder {
    /// Set the username for authentication
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    /// Set the password for authentication
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the connect identifier
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    /// Set the outbound server to attach to
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    /// Set the source database major version (default: 12)
    ///
    /// Selects the position format used when submitting watermarks.
    pub fn server_version(mut self, major: u32) -> Self {
        self.config.server_version = major;
        self
    }

    /// Set the watermark submission interval (default: 10s)
    pub fn watermark_interval(mut self, interval: Duration) -> Self {
        self.config.watermark_interval = interval;
        self
    }

    /// Set the event buffer size (default: 10000)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the watermark acknowledgement mode (default: OnReceive)
    pub fn ack_mode(mut self, mode: AckMode) -> Self {
        self.config.ack_mode = mode;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<XStreamConfig> {
        let mut config = self.config;
        config.validate()?;
        config.redacted_conn_str = config.redacted_connection_string();
        Ok(config)
    }
}

// ============================================================================
// Source
// ============================================================================

/// Oracle XStream CDC source
///
/// Opens a session through the connector and streams [`Message`]s into a
/// bounded channel; take the receiving side with
/// [`take_event_receiver`](Self::take_event_receiver).
pub struct XStreamCdc<C: XStreamConnector> {
    config: XStreamConfig,
    connector: Arc<C>,
    codepages: Arc<CodepageRegistry>,
    active: Arc<AtomicBool>,
    event_tx: Option<mpsc::Sender<Message>>,
    event_rx: Option<mpsc::Receiver<Message>>,
    watermark: ScnWatermark,
    metrics: Arc<XStreamMetrics>,
    last_error: Arc<RwLock<Option<String>>>,
    cancel: Option<CancellationToken>,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<C: XStreamConnector> XStreamCdc<C> {
    /// Create a new XStream CDC source with the default code pages
    pub fn new(config: XStreamConfig, connector: C) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size);
        Self {
            config,
            connector: Arc::new(connector),
            codepages: Arc::new(CodepageRegistry::with_defaults()),
            active: Arc::new(AtomicBool::new(false)),
            event_tx: Some(tx),
            event_rx: Some(rx),
            watermark: ScnWatermark::new(),
            metrics: XStreamMetrics::new(),
            last_error: Arc::new(RwLock::new(None)),
            cancel: None,
            ticker: None,
            worker: None,
        }
    }

    /// Use a custom code-page registry. Must be called before `start`.
    pub fn with_codepages(mut self, codepages: Arc<CodepageRegistry>) -> Self {
        self.codepages = codepages;
        self
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<Message>> {
        self.event_rx.take()
    }

    /// Get configuration
    pub fn config(&self) -> &XStreamConfig {
        &self.config
    }

    /// Get the connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Shared watermark; advance it yourself in [`AckMode::Manual`]
    pub fn watermark(&self) -> ScnWatermark {
        self.watermark.clone()
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> XStreamMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Error that terminated the worker, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read_recovered().clone()
    }

    /// Whether the blocking worker has exited
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }
}

#[async_trait]
impl<C: XStreamConnector> CdcSource for XStreamCdc<C> {
    async fn start(&mut self) -> Result<()> {
        info!(
            "Starting XStream CDC on {} (outbound server {})",
            self.config.redacted_conn_str, self.config.server_name
        );

        if self.active.load(Ordering::SeqCst) {
            return Err(CdcError::invalid_state("CDC source already started"));
        }
        let event_tx = self
            .event_tx
            .take()
            .ok_or_else(|| CdcError::invalid_state("Event sender not available"))?;

        self.active.store(true, Ordering::SeqCst);
        *self.last_error.write_recovered() = None;

        let cancel = CancellationToken::new();
        let (tick_tx, tick_rx) = mpsc::channel(1);

        self.ticker = Some(tokio::spawn(run_watermark_ticker(
            self.config.watermark_interval,
            tick_tx,
            cancel.clone(),
        )));

        let ctx = WorkerContext {
            connector: self.connector.clone(),
            config: self.config.clone(),
            codepages: self.codepages.clone(),
            event_tx,
            tick_rx,
            watermark: self.watermark.clone(),
            metrics: self.metrics.clone(),
            cancel: cancel.clone(),
        };
        let active = self.active.clone();
        let last_error = self.last_error.clone();
        let worker_cancel = cancel.clone();

        self.worker = Some(tokio::task::spawn_blocking(move || {
            if let Err(e) = run_receive_loop(ctx) {
                error!("XStream receive loop error: {}", e);
                *last_error.write_recovered() = Some(e.to_string());
            }
            active.store(false, Ordering::SeqCst);
            worker_cancel.cancel();
        }));
        self.cancel = Some(cancel);

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        info!("Stopping XStream CDC");
        self.active.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// State moved onto the blocking worker.
struct WorkerContext<C: XStreamConnector> {
    connector: Arc<C>,
    config: XStreamConfig,
    codepages: Arc<CodepageRegistry>,
    event_tx: mpsc::Sender<Message>,
    tick_rx: mpsc::Receiver<()>,
    watermark: ScnWatermark,
    metrics: Arc<XStreamMetrics>,
    cancel: CancellationToken,
}

/// Request a watermark submission every `interval`. Ticks that arrive while a
/// request is still pending are dropped.
async fn run_watermark_ticker(
    interval: Duration,
    tick_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match tick_tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => break,
            },
        }
    }
    debug!("Watermark ticker stopped");
}

/// Run the receive loop until cancelled, the receiver is dropped or a record
/// fails.
fn run_receive_loop<C: XStreamConnector>(mut ctx: WorkerContext<C>) -> Result<()> {
    info!(
        "Attaching to outbound server {} ({:?} positions)",
        ctx.config.server_name,
        ctx.config.lcrid_version()
    );
    let mut session = ctx.connector.open_session(&ctx.config)?;
    ctx.connector.attach(&mut session, &ctx.config.server_name)?;
    let mut protocol = LcrProtocol::new(session, ctx.config.lcrid_version(), ctx.codepages.clone());
    let mut acknowledged = Scn::ZERO;

    while !ctx.cancel.is_cancelled() {
        match ctx.tick_rx.try_recv() {
            Ok(()) => submit_watermark(&mut protocol, &ctx, &mut acknowledged),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        let message = match protocol.receive_one()? {
            Some(message) => message,
            None => {
                ctx.metrics.record_skipped();
                continue;
            }
        };

        ctx.metrics.record_message(&message);
        if ctx.config.ack_mode == AckMode::OnReceive {
            ctx.watermark.advance(message.scn());
        }
        if ctx.event_tx.blocking_send(message).is_err() {
            warn!("Event receiver dropped, stopping XStream CDC");
            break;
        }
    }

    info!("XStream receive loop stopped");
    Ok(())
}

/// Submit the current watermark if it moved since the last acknowledgement.
/// Failures are logged and retried on the next tick.
fn submit_watermark<S, C>(protocol: &mut LcrProtocol<S>, ctx: &WorkerContext<C>, acknowledged: &mut Scn)
where
    S: super::session::XStreamOutbound,
    C: XStreamConnector,
{
    let current = ctx.watermark.current();
    if current <= *acknowledged {
        return;
    }
    match protocol.set_watermark(current) {
        Ok(()) => {
            *acknowledged = current;
            ctx.metrics.record_watermark(current);
        }
        Err(e) => {
            warn!("Watermark submission at SCN {} failed: {}", current, e);
            ctx.metrics.record_watermark_failure();
        }
    }
}
