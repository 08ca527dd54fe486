//! # Session Controller — acquisition lifecycle
//!
//! The central orchestrator wiring Line Source → Sanitizer → Ingestion
//! Buffer → Durable Sink, and pushing status events to the external
//! dashboard boundary.
//!
//! ```text
//! start command
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │              SESSION CONTROLLER               │
//! │                                               │
//! │ new()  → sink.resume() → ShardDescriptor      │
//! │ run()  → Connecting: open port, send token    │
//! │              |                                │
//! │              v                                │
//! │          Active loop:                         │
//! │            read_available → clean → buffer    │
//! │              |  (buffer >= batch threshold?)  │
//! │              |            yes                 │
//! │              v                                │
//! │          [Saving] append_batch → new shard    │
//! │              |                                │
//! │              v                                │
//! │          Stopped: close port, final flush     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//!
//! `Idle → Connecting → Active → (Saving, transient) → Stopped`
//!
//! `Saving` is purely a status signal while a flush is in flight, not a
//! distinct control state. `Stopped` is terminal for a controller instance;
//! a new start command constructs a fresh controller, which re-runs the
//! resume scan.
//!
//! ## Concurrency
//!
//! One logical thread of control: the loop polls the source, checks the
//! cooperative [`StopFlag`] once per iteration, and pushes a throttled
//! status snapshot (default every 500 ms). No reading is interrupted
//! mid-read. The sink has exclusive ownership of its output for the
//! session's lifetime.
//!
//! ## Error Policy
//!
//! Device and sink errors terminate the `Active` state and are never retried
//! within a run. A failed flush leaves the buffer intact; one final
//! `append_batch` is attempted at shutdown, and if that also fails the loss
//! is reported explicitly via [`SessionEvent::DataLoss`].

mod run;
mod status;

pub use run::{SessionSummary, StopReason};
pub use status::{
    NullObserver, SessionEvent, SessionState, StatusObserver, StatusSnapshot, StopFlag,
};

use std::collections::VecDeque;

use buffer::IngestBuffer;
use config::Config;
use sink::{DurableSink, ShardDescriptor};

/// Owns one run/stop lifecycle. Constructed per start command; discarded
/// once [`run`](SessionController::run) returns.
pub struct SessionController<S: DurableSink> {
    pub(crate) sink: S,
    pub(crate) cfg: Config,
    pub(crate) buffer: IngestBuffer,
    /// Active shard, reconstructed by the resume scan at construction and
    /// advanced only after successful writes.
    pub(crate) shard: ShardDescriptor,
    pub(crate) state: SessionState,
    pub(crate) rows_committed: u64,
    pub(crate) flushes: u64,
    /// Rolling preview of the most recent readings, dashboard-only.
    pub(crate) preview: VecDeque<String>,
    pub(crate) last_reading: Option<String>,
    pub(crate) last_value: Option<f64>,
}

impl<S: DurableSink> SessionController<S> {
    /// Builds a fresh session over `sink`, running the resume scan to
    /// recover the shard index and committed row count to continue from.
    pub fn new(mut sink: S, cfg: Config) -> Self {
        let shard = sink.resume();
        Self {
            sink,
            cfg,
            buffer: IngestBuffer::new(),
            shard,
            state: SessionState::Idle,
            rows_committed: 0,
            flushes: 0,
            preview: VecDeque::new(),
            last_reading: None,
            last_value: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The shard the next flush will target (before any rollover decision).
    pub fn shard(&self) -> &ShardDescriptor {
        &self.shard
    }

    /// Readings buffered in memory since the last flush.
    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            shard_index: self.shard.index,
            committed_rows: self.shard.committed_rows,
            buffered_rows: self.buffer.len(),
            last_reading: self.last_reading.clone(),
            last_value: self.last_value,
            preview: self.preview.iter().cloned().collect(),
        }
    }

    pub(crate) fn set_state(&mut self, state: SessionState, observer: &mut dyn StatusObserver) {
        if self.state != state {
            self.state = state;
            observer.notify(&SessionEvent::StateChanged(state));
        }
    }
}

#[cfg(test)]
mod tests;
