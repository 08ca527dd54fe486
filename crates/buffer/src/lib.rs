use chrono::{DateTime, Local};

/// One timestamped instrument reading. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl Reading {
    /// Stamps `text` with the current local time.
    pub fn now(text: String) -> Self {
        Self {
            timestamp: Local::now(),
            text,
        }
    }

    pub fn at(timestamp: DateTime<Local>, text: String) -> Self {
        Self { timestamp, text }
    }
}

/// Append-only in-memory buffer of readings awaiting a flush.
///
/// Insertion order is arrival order is required write order. A flush either
/// commits the whole buffer or the buffer is preserved: callers `drain()` a
/// batch and, on write failure, `restore()` it untouched.
#[derive(Debug, Default)]
pub struct IngestBuffer {
    readings: Vec<Reading>,
}

impl IngestBuffer {
    pub fn new() -> Self {
        Self {
            readings: Vec::new(),
        }
    }

    /// Appends one reading. Never fails.
    pub fn append(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Atomically empties the buffer, returning everything collected since
    /// the previous drain in arrival order.
    pub fn drain(&mut self) -> Vec<Reading> {
        std::mem::take(&mut self.readings)
    }

    /// Puts a drained batch back at the front, ahead of anything appended
    /// since the drain. Used after a failed flush so no reading is lost and
    /// write order is preserved.
    pub fn restore(&mut self, mut batch: Vec<Reading>) {
        batch.append(&mut self.readings);
        self.readings = batch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(n: u32) -> Reading {
        Reading::now(format!("r{n}"))
    }

    #[test]
    fn drain_yields_fifo_order() {
        let mut buf = IngestBuffer::new();
        for n in 0..10 {
            buf.append(reading(n));
        }
        assert_eq!(buf.len(), 10);
        let drained = buf.drain();
        assert!(buf.is_empty());
        let texts: Vec<_> = drained.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9"]
        );
    }

    #[test]
    fn randomized_interleaving_preserves_order_without_loss() {
        // Deterministic LCG so the interleaving is reproducible.
        let mut state = 0x2545f491_u64;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u32
        };

        let mut buf = IngestBuffer::new();
        let mut appended = 0u32;
        let mut collected = Vec::new();

        for _ in 0..1_000 {
            if next() % 4 == 0 {
                collected.extend(buf.drain());
            } else {
                buf.append(reading(appended));
                appended += 1;
            }
        }
        collected.extend(buf.drain());

        // No loss, no duplication, no reordering.
        assert_eq!(collected.len() as u32, appended);
        for (i, r) in collected.iter().enumerate() {
            assert_eq!(r.text, format!("r{i}"));
        }
    }

    #[test]
    fn restore_puts_batch_ahead_of_new_arrivals() {
        let mut buf = IngestBuffer::new();
        buf.append(reading(0));
        buf.append(reading(1));
        let batch = buf.drain();

        // Arrivals during the failed flush.
        buf.append(reading(2));
        buf.restore(batch);

        let texts: Vec<_> = buf.drain().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn restore_after_failed_flush_keeps_everything() {
        let mut buf = IngestBuffer::new();
        for n in 0..500 {
            buf.append(reading(n));
        }
        let batch = buf.drain();
        assert!(buf.is_empty());
        buf.restore(batch);
        assert_eq!(buf.len(), 500);
    }
}
