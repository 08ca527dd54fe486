//! # Durable Sink — batched, resumable on-disk output
//!
//! Owns the on-disk side of the acquisition pipeline: which shard is active,
//! how many rows it already holds, when to roll over to the next shard, and
//! whether a header row is due. Two physical layouts implement one
//! interface:
//!
//! | Sink              | Layout                                    | Capacity  |
//! |-------------------|-------------------------------------------|-----------|
//! | [`ShardedCsvSink`] | directory of `sheet-<n>.csv` shard files | bounded   |
//! | [`FlatCsvSink`]    | single append-only delimited file        | unbounded |
//!
//! ## Append Algorithm
//!
//! ```text
//! append_batch(shard, batch):
//!   1. committed + len(batch) > capacity and committed > 0
//!        -> target = shard.next()        (index+1, 0 rows, header due)
//!      else
//!        -> target = shard               (header due iff committed == 0)
//!   2. encode header? + all rows into one payload
//!   3. fresh shard  -> temp file + fsync + rename  (atomic create)
//!      append      -> O_APPEND write_all + fsync   (single write)
//!   4. Ok  -> return target with committed += len(batch)
//!      Err -> on-disk state unchanged; caller keeps its descriptor and
//!             retries the same batch or stops without data loss
//! ```
//!
//! A batch is never split across shards; an oversized batch lands in full on
//! a shard whose `committed_rows` was 0.
//!
//! ## Resume
//!
//! [`DurableSink::resume`] is the resume scanner: it reconstructs the active
//! [`ShardDescriptor`] from existing output at session start. It never
//! fails — unreadable or corrupt output is logged as a warning and treated
//! as absent, so startup is never blocked.
//!
//! ## Single Writer
//!
//! The sink assumes exclusive ownership of its output location for the
//! session's lifetime. There is no locking.

mod flat;
mod row;
mod sharded;

pub use flat::FlatCsvSink;
pub use row::{count_data_rows, encode_batch, HEADER, TIMESTAMP_FORMAT};
pub use sharded::{ShardedCsvSink, DEFAULT_SHARD_PREFIX};

use buffer::Reading;
use thiserror::Error;

/// Errors while writing to durable output.
#[derive(Debug, Error)]
pub enum WriteError {
    /// An underlying I/O error (disk full, locked file, missing shard).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The output location cannot hold this sink's layout.
    #[error("invalid output location {}: {reason}", .path.display())]
    InvalidLocation {
        path: std::path::PathBuf,
        reason: String,
    },
}

/// The resume point and rollover bookkeeping for one output shard.
///
/// One descriptor maps to one physical container. It is reconstructed by
/// [`DurableSink::resume`] at session start, held for the session, and
/// advanced only by [`DurableSink::append_batch`] after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    /// 1-based shard index.
    pub index: u32,
    /// Rows durably written to this shard, excluding the header.
    pub committed_rows: u64,
    /// Row limit before rollover. `u64::MAX` for flat output.
    pub capacity: u64,
}

impl ShardDescriptor {
    /// The descriptor a brand-new output starts from.
    pub fn fresh(capacity: u64) -> Self {
        Self {
            index: 1,
            committed_rows: 0,
            capacity,
        }
    }

    /// The successor shard after rollover.
    pub fn next(&self) -> Self {
        Self {
            index: self.index + 1,
            committed_rows: 0,
            capacity: self.capacity,
        }
    }

    /// Whether appending `rows` more would exceed this shard's capacity.
    pub fn would_overflow(&self, rows: u64) -> bool {
        self.committed_rows.saturating_add(rows) > self.capacity
    }
}

/// One interface over both output layouts.
///
/// `append_batch` is idempotent per call in the sense that a failed call
/// leaves on-disk state unchanged; the caller must not advance its in-memory
/// descriptor on failure.
pub trait DurableSink {
    /// Scans existing output and returns the shard descriptor to continue
    /// from. Never fails; problems degrade to a warning and a fresh
    /// descriptor.
    fn resume(&mut self) -> ShardDescriptor;

    /// Durably appends `batch` (in order), rolling over to a new shard when
    /// the current one is full. Returns the advanced descriptor.
    fn append_batch(
        &mut self,
        shard: &ShardDescriptor,
        batch: &[Reading],
    ) -> Result<ShardDescriptor, WriteError>;

    /// Whether this sink rolls over between bounded shards.
    fn shardable(&self) -> bool;
}

#[cfg(test)]
mod tests;
