//! Flat output: one append-only delimited file.
//!
//! The shard model degenerates to a single always-valid shard with unbounded
//! capacity. The header is written iff the file does not yet exist, so
//! subsequent sessions append without re-writing it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use buffer::Reading;

use crate::row;
use crate::{DurableSink, ShardDescriptor, WriteError};

/// [`DurableSink`] over a single delimited file.
pub struct FlatCsvSink {
    path: PathBuf,
}

impl FlatCsvSink {
    /// Creates the sink, ensuring the parent directory exists.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableSink for FlatCsvSink {
    fn resume(&mut self) -> ShardDescriptor {
        if !self.path.exists() {
            return ShardDescriptor::fresh(u64::MAX);
        }
        match row::count_data_rows(&self.path) {
            Ok(committed_rows) => {
                tracing::info!(committed_rows, "resuming flat output");
                ShardDescriptor {
                    index: 1,
                    committed_rows,
                    capacity: u64::MAX,
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not inspect existing output, starting fresh"
                );
                ShardDescriptor::fresh(u64::MAX)
            }
        }
    }

    fn append_batch(
        &mut self,
        shard: &ShardDescriptor,
        batch: &[Reading],
    ) -> Result<ShardDescriptor, WriteError> {
        // Header decision is keyed on file existence, not the descriptor: an
        // earlier session may have left a header-only file behind.
        let write_header = !self.path.exists();
        let payload = row::encode_batch(batch, write_header);

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(&payload)?;
        f.flush()?;
        f.sync_all()?;

        Ok(ShardDescriptor {
            index: shard.index,
            committed_rows: shard.committed_rows + batch.len() as u64,
            capacity: shard.capacity,
        })
    }

    fn shardable(&self) -> bool {
        false
    }
}
