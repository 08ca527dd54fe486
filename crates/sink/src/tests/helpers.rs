use std::fs;
use std::path::Path;

use buffer::Reading;
use chrono::{Local, TimeZone};

/// Builds `n` readings with deterministic timestamps and texts `r<start>`..
pub fn readings(start: u32, n: u32) -> Vec<Reading> {
    (start..start + n)
        .map(|i| {
            let ts = Local
                .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .unwrap()
                + chrono::Duration::milliseconds(i as i64 * 250);
            Reading::at(ts, format!("r{i}"))
        })
        .collect()
}

/// Lines of a shard file, split for assertions.
pub fn file_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Data rows of a shard file (everything after the header).
pub fn data_rows(path: &Path) -> Vec<String> {
    let lines = file_lines(path);
    assert_eq!(lines[0], crate::HEADER, "first line must be the header");
    lines[1..].to_vec()
}

/// Asserts a shard file holds exactly one header plus `expected` data rows.
pub fn assert_shard_rows(path: &Path, expected: usize) {
    let lines = file_lines(path);
    let header_count = lines.iter().filter(|l| *l == crate::HEADER).count();
    assert_eq!(header_count, 1, "shard must have exactly one header row");
    assert_eq!(lines[0], crate::HEADER);
    assert_eq!(lines.len() - 1, expected, "unexpected data row count");
}
