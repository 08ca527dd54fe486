use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use buffer::Reading;
use config::Config;
use sink::{DurableSink, ShardDescriptor, WriteError};
use source::{LineSource, SourceError};

use crate::{SessionEvent, SessionState, StatusObserver, StopFlag};

/// What a [`ScriptedSource`] does once its script runs out.
pub enum Exhausted {
    /// Request a cooperative stop, as an operator would.
    RequestStop(StopFlag),
    /// Drop the handle, simulating an unexpected disconnection.
    CloseHandle,
}

/// In-memory [`LineSource`] yielding pre-scripted chunks of raw lines.
pub struct ScriptedSource {
    chunks: VecDeque<Vec<Vec<u8>>>,
    on_exhausted: Exhausted,
    open: Arc<AtomicBool>,
    token_ok: bool,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<Vec<Vec<u8>>>, on_exhausted: Exhausted) -> Self {
        Self {
            chunks: chunks.into(),
            on_exhausted,
            open: Arc::new(AtomicBool::new(true)),
            token_ok: true,
        }
    }

    /// `total` lines `w0..` with leading whitespace and CR to exercise the
    /// sanitizer, delivered `chunk_size` at a time.
    pub fn chunked(total: u32, chunk_size: u32, on_exhausted: Exhausted) -> Self {
        let lines: Vec<Vec<u8>> = (0..total).map(|i| format!(" w{i}\r").into_bytes()).collect();
        let chunks = lines
            .chunks(chunk_size as usize)
            .map(|c| c.to_vec())
            .collect();
        Self::new(chunks, on_exhausted)
    }

    pub fn with_failing_token(mut self) -> Self {
        self.token_ok = false;
        self
    }

    /// Handle-open flag, observable after the controller consumed the
    /// source.
    pub fn open_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.open)
    }
}

impl LineSource for ScriptedSource {
    fn read_available(&mut self) -> Result<Vec<Vec<u8>>, SourceError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SourceError::Closed);
        }
        match self.chunks.pop_front() {
            Some(chunk) => Ok(chunk),
            None => {
                match &self.on_exhausted {
                    Exhausted::RequestStop(flag) => flag.request(),
                    Exhausted::CloseHandle => self.open.store(false, Ordering::SeqCst),
                }
                Ok(Vec::new())
            }
        }
    }

    fn send_startup_token(&mut self) -> Result<(), SourceError> {
        if self.token_ok {
            Ok(())
        } else {
            Err(SourceError::Closed)
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Sink wrapper that fails its first `failures` append calls, then delegates.
pub struct FailingSink<S> {
    inner: S,
    failures: usize,
}

impl<S> FailingSink<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self { inner, failures }
    }
}

impl<S: DurableSink> DurableSink for FailingSink<S> {
    fn resume(&mut self) -> ShardDescriptor {
        self.inner.resume()
    }

    fn append_batch(
        &mut self,
        shard: &ShardDescriptor,
        batch: &[Reading],
    ) -> Result<ShardDescriptor, WriteError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(WriteError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.inner.append_batch(shard, batch)
    }

    fn shardable(&self) -> bool {
        self.inner.shardable()
    }
}

/// Observer recording every event for assertions.
#[derive(Default)]
pub struct CollectingObserver {
    pub events: Vec<SessionEvent>,
}

impl StatusObserver for CollectingObserver {
    fn notify(&mut self, event: &SessionEvent) {
        self.events.push(event.clone());
    }
}

impl CollectingObserver {
    pub fn states(&self) -> Vec<SessionState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn flushed_rows(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Flushed { rows, .. } => Some(*rows),
                _ => None,
            })
            .collect()
    }

    pub fn has_fatal(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, SessionEvent::Fatal(_)))
    }

    pub fn has_warning(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, SessionEvent::Warning(_)))
    }

    pub fn data_loss(&self) -> Option<usize> {
        self.events.iter().find_map(|e| match e {
            SessionEvent::DataLoss { rows } => Some(*rows),
            _ => None,
        })
    }
}

/// Config tuned for tests: fast refresh, small preview.
pub fn test_config(batch_threshold: usize) -> Config {
    Config {
        batch_threshold,
        refresh_interval: Duration::from_millis(1),
        preview_rows: 5,
        ..Config::default()
    }
}

/// Data rows (everything after the header) of one shard file.
pub fn shard_rows(path: &std::path::Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<_> = text.lines().map(str::to_string).collect();
    assert_eq!(lines[0], sink::HEADER);
    lines[1..].to_vec()
}
