//! Sharded output: a directory of capacity-bounded delimited shard files.
//!
//! Shard `n` lives at `<dir>/<prefix><n>.csv` (1-based). Each shard carries
//! exactly one header row. A shard's first write goes through a temp file +
//! fsync + rename so a crash mid-write never leaves a half-built shard at
//! the final name; appends to an existing shard are a single `O_APPEND`
//! `write_all` of the pre-encoded payload followed by fsync.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use buffer::Reading;

use crate::row;
use crate::{DurableSink, ShardDescriptor, WriteError};

/// Default filename prefix for shard files.
pub const DEFAULT_SHARD_PREFIX: &str = "sheet-";

/// [`DurableSink`] over a directory of shard files.
pub struct ShardedCsvSink {
    dir: PathBuf,
    prefix: String,
    capacity: u64,
}

impl ShardedCsvSink {
    /// Creates the sink, ensuring the output directory exists.
    pub fn new<P: AsRef<Path>>(dir: P, capacity: u64) -> Result<Self, WriteError> {
        Self::with_prefix(dir, capacity, DEFAULT_SHARD_PREFIX)
    }

    /// As [`new`](Self::new) with a custom shard filename prefix.
    pub fn with_prefix<P: AsRef<Path>>(
        dir: P,
        capacity: u64,
        prefix: &str,
    ) -> Result<Self, WriteError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        if capacity == 0 {
            return Err(WriteError::InvalidLocation {
                path: dir,
                reason: "shard capacity must be positive".to_string(),
            });
        }
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            capacity,
        })
    }

    /// Path of shard `index` within the output directory.
    pub fn shard_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{}{}.csv", self.prefix, index))
    }

    fn parse_index(&self, name: &str) -> Option<u32> {
        let index: u32 = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(".csv")?
            .parse()
            .ok()?;
        (index >= 1).then_some(index)
    }

    fn try_resume(&self) -> Result<ShardDescriptor, WriteError> {
        let mut highest: Option<u32> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(|n| self.parse_index(n)) {
                highest = Some(highest.map_or(index, |h| h.max(index)));
            }
        }

        let Some(index) = highest else {
            return Ok(ShardDescriptor::fresh(self.capacity));
        };

        let committed_rows = row::count_data_rows(&self.shard_path(index))?;
        let descriptor = ShardDescriptor {
            index,
            committed_rows,
            capacity: self.capacity,
        };

        // A full shard resumes on its successor.
        if committed_rows >= self.capacity {
            Ok(descriptor.next())
        } else {
            Ok(descriptor)
        }
    }

    /// Atomically creates a fresh shard file containing `payload`.
    fn write_fresh_shard(&self, path: &Path, payload: &[u8]) -> Result<(), WriteError> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            f.write_all(payload)?;
            f.flush()?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn append_to_shard(&self, path: &Path, payload: &[u8]) -> Result<(), WriteError> {
        // No `create`: a shard with committed rows must already exist, and
        // appending headerless rows to a missing file would corrupt resume.
        let mut f = OpenOptions::new().append(true).open(path)?;
        f.write_all(payload)?;
        f.flush()?;
        f.sync_all()?;
        Ok(())
    }
}

impl DurableSink for ShardedCsvSink {
    fn resume(&mut self) -> ShardDescriptor {
        match self.try_resume() {
            Ok(descriptor) => {
                tracing::info!(
                    index = descriptor.index,
                    committed_rows = descriptor.committed_rows,
                    "resuming sharded output"
                );
                descriptor
            }
            Err(e) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "could not inspect existing output, starting fresh"
                );
                ShardDescriptor::fresh(self.capacity)
            }
        }
    }

    fn append_batch(
        &mut self,
        shard: &ShardDescriptor,
        batch: &[Reading],
    ) -> Result<ShardDescriptor, WriteError> {
        let rows = batch.len() as u64;

        // Roll over when the batch would not fit; a shard with zero rows
        // takes the batch in place even when oversized (no splitting).
        let target = if shard.committed_rows > 0 && shard.would_overflow(rows) {
            shard.next()
        } else {
            shard.clone()
        };

        let write_header = target.committed_rows == 0;
        let payload = row::encode_batch(batch, write_header);
        let path = self.shard_path(target.index);

        if write_header {
            self.write_fresh_shard(&path, &payload)?;
        } else {
            self.append_to_shard(&path, &payload)?;
        }

        Ok(ShardDescriptor {
            index: target.index,
            committed_rows: target.committed_rows + rows,
            capacity: target.capacity,
        })
    }

    fn shardable(&self) -> bool {
        true
    }
}
