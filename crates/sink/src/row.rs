//! Delimited row encoding and line accounting.
//!
//! The sanitizer guarantees persisted text contains no control characters,
//! so one record is always exactly one line on disk and resume can count
//! rows by counting newlines. Fields are quoted only when they contain a
//! comma or a quote.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use buffer::Reading;

/// Header row written exactly once per shard (or flat file).
pub const HEADER: &str = "Timestamp,Response";

/// Timestamp column format, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Encodes an entire batch (plus the header when due) into one payload so
/// the sink can issue a single write call.
pub fn encode_batch(batch: &[Reading], with_header: bool) -> Vec<u8> {
    // Rough per-row estimate: 23-char timestamp + separator + text + newline.
    let mut out = Vec::with_capacity(batch.len() * 32 + HEADER.len() + 1);
    if with_header {
        out.extend_from_slice(HEADER.as_bytes());
        out.push(b'\n');
    }
    for reading in batch {
        let ts = reading.timestamp.format(TIMESTAMP_FORMAT);
        out.extend_from_slice(ts.to_string().as_bytes());
        out.push(b',');
        out.extend_from_slice(encode_field(&reading.text).as_bytes());
        out.push(b'\n');
    }
    out
}

fn encode_field(text: &str) -> Cow<'_, str> {
    if text.contains(',') || text.contains('"') {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

/// Counts committed data rows in an existing shard or flat file: complete
/// lines minus the header line, floored at zero. A partial trailing line
/// (no terminator) is not counted.
pub fn count_data_rows(path: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut lines = 0u64;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        let consumed = buf.len();
        reader.consume(consumed);
    }
    Ok(lines.saturating_sub(1))
}
