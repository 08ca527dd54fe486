//! Status and cancellation surface exposed to the external dashboard.
//!
//! The dashboard itself is out of scope; it is an external consumer that
//! implements [`StatusObserver`] and receives [`SessionEvent`]s. State
//! changes, flush confirmations, and failures are pushed immediately;
//! [`StatusSnapshot`]s are throttled to the configured refresh cadence.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session activity yet; waiting for a start command.
    Idle,
    /// Opening the port and sending the startup token.
    Connecting,
    /// Draining the source continuously.
    Active,
    /// Transient: a flush is in flight. A status signal, not a control state.
    Saving,
    /// Terminal for this session instance.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Saving => "saving",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Cooperative stop request. Cloned freely; a request only takes effect the
/// next time the acquisition loop checks it.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers that set an `AtomicBool`.
    pub fn shared(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Point-in-time view of the session for the dashboard.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: SessionState,
    /// 1-based index of the active shard.
    pub shard_index: u32,
    /// Rows durably committed to the active shard.
    pub committed_rows: u64,
    /// Readings held in memory awaiting a flush.
    pub buffered_rows: usize,
    /// Most recent cleaned reading.
    pub last_reading: Option<String>,
    /// First numeric token of the most recent reading, display-only.
    pub last_value: Option<f64>,
    /// The last N readings, oldest first.
    pub preview: Vec<String>,
}

/// Notifications pushed from the controller to the dashboard boundary.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Throttled periodic snapshot.
    Status(StatusSnapshot),
    /// A batch reached durable storage.
    Flushed { shard_index: u32, rows: usize },
    /// Non-fatal condition, e.g. the startup token was rejected.
    Warning(String),
    /// Fatal condition; the session is about to stop.
    Fatal(String),
    /// The shutdown flush failed; this many readings were not persisted.
    DataLoss { rows: usize },
}

/// Consumer of session events. Implemented by the presentation layer.
pub trait StatusObserver {
    fn notify(&mut self, event: &SessionEvent);
}

/// Observer that discards everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl StatusObserver for NullObserver {
    fn notify(&mut self, _event: &SessionEvent) {}
}
