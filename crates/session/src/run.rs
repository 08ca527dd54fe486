//! The acquisition loop: `Connecting → Active → Stopped`.

use std::fmt;
use std::time::{Duration, Instant};

use buffer::Reading;
use sink::{DurableSink, ShardDescriptor, WriteError};
use source::{LineSource, SourceError};

use crate::{SessionController, SessionEvent, SessionState, StatusObserver, StopFlag};

/// Pause between idle polls so an inactive link does not spin the CPU.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Why the session left the `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// External stop request.
    Requested,
    /// The port could not be opened.
    ConnectFailed,
    /// The source unexpectedly reported its handle closed.
    SourceClosed,
    /// A read on the open handle failed.
    SourceError,
    /// A flush failed; the buffer was preserved for the shutdown attempt.
    SinkError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Requested => "stop requested",
            StopReason::ConnectFailed => "connection failed",
            StopReason::SourceClosed => "source closed unexpectedly",
            StopReason::SourceError => "source read error",
            StopReason::SinkError => "write error",
        };
        f.write_str(s)
    }
}

/// Final accounting for one session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub reason: StopReason,
    /// Successful `append_batch` calls, including the shutdown flush.
    pub flushes: u64,
    /// Rows durably written across the whole session.
    pub rows_committed: u64,
    /// Rows lost because the shutdown flush also failed. Zero on any clean
    /// path.
    pub rows_lost: u64,
    /// The descriptor the next session's resume scan must reconstruct.
    pub shard: ShardDescriptor,
}

impl<S: DurableSink> SessionController<S> {
    /// Runs the session to completion, consuming the controller.
    ///
    /// `connect` opens the line source (the `Connecting` state); `observer`
    /// receives status events; `stop` is checked cooperatively once per loop
    /// iteration.
    pub fn run<L, C>(
        mut self,
        connect: C,
        observer: &mut dyn StatusObserver,
        stop: &StopFlag,
    ) -> SessionSummary
    where
        L: LineSource,
        C: FnOnce() -> Result<L, SourceError>,
    {
        self.set_state(SessionState::Connecting, observer);
        let mut line_source = match connect() {
            Ok(s) => s,
            Err(e) => {
                observer.notify(&SessionEvent::Fatal(format!("connection failed: {e}")));
                return self.finish(StopReason::ConnectFailed, None::<&mut L>, observer);
            }
        };

        // Failure here is non-fatal: the device may already be streaming.
        if let Err(e) = line_source.send_startup_token() {
            tracing::warn!(error = %e, "startup token not accepted");
            observer.notify(&SessionEvent::Warning(format!(
                "startup token failed: {e}"
            )));
        }

        self.set_state(SessionState::Active, observer);
        let mut next_status = Instant::now();

        let reason = loop {
            if stop.is_requested() {
                break StopReason::Requested;
            }
            if !line_source.is_open() {
                observer.notify(&SessionEvent::Fatal(
                    "serial port unexpectedly closed".to_string(),
                ));
                break StopReason::SourceClosed;
            }

            let lines = match line_source.read_available() {
                Ok(lines) => lines,
                Err(e) => {
                    observer.notify(&SessionEvent::Fatal(format!("read failed: {e}")));
                    break StopReason::SourceError;
                }
            };
            let idle = lines.is_empty();

            for raw in &lines {
                // A rejected line is a skipped tick, not an error.
                if let Some(text) = sanitize::clean(raw) {
                    self.ingest(text);
                }
            }

            if self.buffer.len() >= self.cfg.batch_threshold {
                self.set_state(SessionState::Saving, observer);
                match self.flush(observer) {
                    Ok(()) => self.set_state(SessionState::Active, observer),
                    Err(e) => {
                        observer.notify(&SessionEvent::Fatal(format!("write failed: {e}")));
                        break StopReason::SinkError;
                    }
                }
            }

            let now = Instant::now();
            if now >= next_status {
                observer.notify(&SessionEvent::Status(self.snapshot()));
                next_status = now + self.cfg.refresh_interval;
            }

            if idle {
                std::thread::sleep(IDLE_SLEEP);
            }
        };

        self.finish(reason, Some(&mut line_source), observer)
    }

    fn ingest(&mut self, text: String) {
        self.last_value = sanitize::numeric_hint(&text);
        self.preview.push_back(text.clone());
        while self.preview.len() > self.cfg.preview_rows {
            self.preview.pop_front();
        }
        self.last_reading = Some(text.clone());
        self.buffer.append(Reading::now(text));
    }

    /// Drains the buffer into the sink. On failure the batch is restored so
    /// no reading is lost; the caller decides whether to stop.
    fn flush(&mut self, observer: &mut dyn StatusObserver) -> Result<(), WriteError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = self.buffer.drain();
        match self.sink.append_batch(&self.shard, &batch) {
            Ok(next) => {
                self.rows_committed += batch.len() as u64;
                self.flushes += 1;
                observer.notify(&SessionEvent::Flushed {
                    shard_index: next.index,
                    rows: batch.len(),
                });
                self.shard = next;
                Ok(())
            }
            Err(e) => {
                self.buffer.restore(batch);
                Err(e)
            }
        }
    }

    /// Shutdown path for every exit: close the handle (idempotent), attempt
    /// exactly one final flush, report the outcome, and end the session.
    fn finish<L: LineSource>(
        mut self,
        reason: StopReason,
        line_source: Option<&mut L>,
        observer: &mut dyn StatusObserver,
    ) -> SessionSummary {
        if let Some(src) = line_source {
            src.close();
        }

        let mut rows_lost = 0u64;
        if !self.buffer.is_empty() {
            let pending = self.buffer.len();
            if let Err(e) = self.flush(observer) {
                rows_lost = pending as u64;
                tracing::error!(rows = pending, error = %e, "shutdown flush failed");
                observer.notify(&SessionEvent::DataLoss { rows: pending });
            }
        }

        self.set_state(SessionState::Stopped, observer);
        observer.notify(&SessionEvent::Status(self.snapshot()));

        SessionSummary {
            reason,
            flushes: self.flushes,
            rows_committed: self.rows_committed,
            rows_lost,
            shard: self.shard,
        }
    }
}
