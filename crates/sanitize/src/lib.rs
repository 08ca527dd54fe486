//! Record sanitization for raw instrument lines.
//!
//! The instrument emits line-delimited text with occasional garbage: stray
//! control characters, carriage returns, and (on noisy links) invalid UTF-8
//! byte sequences. [`clean`] turns one raw line into a persistable record or
//! rejects it. Rejection is a skipped tick, not an error.
//!
//! The persisted text is guaranteed to contain no ASCII control characters,
//! which the sink relies on: one record is always exactly one line on disk.

/// Cleans a raw byte line into a record.
///
/// Invalid UTF-8 sequences are dropped (not fatal), ASCII control characters
/// (0x00–0x1F, 0x7F) are stripped, and surrounding whitespace is trimmed.
/// Returns `None` when nothing remains.
pub fn clean(raw: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(raw);
    let cleaned: String = decoded
        .chars()
        .filter(|c| !c.is_ascii_control() && *c != char::REPLACEMENT_CHARACTER)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extracts the first signed decimal or integer token from a cleaned record.
///
/// Display-only: the dashboard charts this value, persistence never looks at
/// it. Accepts forms like `12`, `-3.75`, `+.5`, `120.00 g` (first token wins).
pub fn numeric_hint(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let mut j = i;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let int_digits = count_digits(bytes, &mut j);
        let mut frac_digits = 0;
        if j < bytes.len() && bytes[j] == b'.' {
            let mut k = j + 1;
            frac_digits = count_digits(bytes, &mut k);
            if frac_digits > 0 {
                j = k;
            }
        }
        if int_digits > 0 || frac_digits > 0 {
            if let Ok(v) = text[start..j].parse::<f64>() {
                return Some(v);
            }
        }
        // Advance past whatever we examined so a lone sign or dot cannot
        // stall the scan.
        i = if j > i { j } else { i + 1 };
    }
    None
}

fn count_digits(bytes: &[u8], pos: &mut usize) -> usize {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    *pos - start
}
