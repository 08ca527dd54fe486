//! Typed configuration for the TareLog acquisition pipeline.
//!
//! Every tunable recognized by the system lives here with its default value.
//! Parsing from the environment stays in the `cli` crate; library crates only
//! ever see this struct.

use std::path::PathBuf;
use std::time::Duration;

/// Default baud rate for the instrument link.
pub const DEFAULT_BAUD: u32 = 9600;
/// Default number of buffered readings that triggers a flush.
pub const DEFAULT_BATCH_THRESHOLD: usize = 500;
/// Default row capacity of one output shard.
pub const DEFAULT_SHARD_CAPACITY: u64 = 800_000;

/// Physical layout of the durable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Directory of capacity-bounded shard files, one header row each.
    Sharded,
    /// Single append-only delimited file with unbounded capacity.
    Flat,
}

/// Full configuration surface of a logging session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port identifier (e.g. `/dev/ttyUSB0` or `COM5`).
    pub port: String,
    /// Baud rate for the 8-N-1 link.
    pub baud: u32,
    /// Read timeout on the serial handle. An idle port yields zero lines,
    /// never an error.
    pub read_timeout: Duration,
    /// Output location: a directory for [`OutputFormat::Sharded`], a file
    /// path for [`OutputFormat::Flat`].
    pub output: PathBuf,
    pub format: OutputFormat,
    /// Readings buffered in memory before a flush is triggered.
    pub batch_threshold: usize,
    /// Rows per shard before rollover. Ignored by flat output.
    pub shard_capacity: u64,
    /// Minimum interval between status pushes to the observer.
    pub refresh_interval: Duration,
    /// Number of recent readings kept in the rolling status preview.
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: DEFAULT_BAUD,
            read_timeout: Duration::from_millis(200),
            output: PathBuf::from("readings"),
            format: OutputFormat::Sharded,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            shard_capacity: DEFAULT_SHARD_CAPACITY,
            refresh_interval: Duration::from_millis(500),
            preview_rows: 10,
        }
    }
}
