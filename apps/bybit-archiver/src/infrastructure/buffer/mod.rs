//! Record Buffer
//!
//! Concurrency-safe accumulator shared between the feed client (append) and
//! the flush scheduler (drain). All known keys are fixed at construction
//! from the instrument catalog; a single mutex over the whole map makes
//! `drain_all` atomic with respect to concurrent `append`: every appended
//! record is observed by exactly one drain.
//!
//! Growth between flushes is unbounded by design; it is bounded only by the
//! flush interval times the feed rate.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::catalog::{InstrumentCatalog, StreamKey};

/// One buffered record: the raw message payload as received.
pub type Record = serde_json::Value;

/// Error appending to the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The key was not registered at construction. Resolution against the
    /// same catalog makes this unreachable in the live pipeline; it is
    /// surfaced rather than panicked for direct callers.
    #[error("stream key {0} is not registered in the buffer")]
    UnknownKey(StreamKey),
}

/// Shared in-memory accumulator keyed by (instrument, category).
#[derive(Debug)]
pub struct RecordBuffer {
    entries: Mutex<HashMap<StreamKey, Vec<Record>>>,
}

impl RecordBuffer {
    /// Create a buffer with one empty sequence per catalog key.
    #[must_use]
    pub fn new(catalog: &InstrumentCatalog) -> Self {
        let entries = catalog.keys().map(|key| (key, Vec::new())).collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Append a record to the tail of `key`'s sequence. O(1) amortized;
    /// holds the lock only for the push.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::UnknownKey`] if `key` was not registered.
    pub fn append(&self, key: &StreamKey, record: Record) -> Result<(), BufferError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(records) => {
                records.push(record);
                Ok(())
            }
            None => Err(BufferError::UnknownKey(key.clone())),
        }
    }

    /// Atomically take every key's full sequence and reset it to empty.
    ///
    /// Returns all known keys, including those with empty sequences; callers
    /// skip empty batches.
    #[must_use]
    pub fn drain_all(&self) -> HashMap<StreamKey, Vec<Record>> {
        let mut entries = self.entries.lock();
        entries
            .iter_mut()
            .map(|(key, records)| (key.clone(), std::mem::take(records)))
            .collect()
    }

    /// Number of buffered records for `key`, if registered.
    #[must_use]
    pub fn len(&self, key: &StreamKey) -> Option<usize> {
        self.entries.lock().get(key).map(Vec::len)
    }

    /// Total records buffered across all keys.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn buffer() -> (RecordBuffer, StreamKey) {
        let mut instruments = BTreeMap::new();
        instruments.insert("BTCUSDT".to_string(), vec!["publicTrade".to_string()]);
        let catalog = InstrumentCatalog::new(instruments).unwrap();
        let key = StreamKey::new("BTCUSDT", "publicTrade");
        (RecordBuffer::new(&catalog), key)
    }

    #[test]
    fn append_preserves_insertion_order() {
        let (buffer, key) = buffer();
        for i in 0..3 {
            buffer.append(&key, json!({ "seq": i })).unwrap();
        }

        let drained = buffer.drain_all();
        let records = &drained[&key];
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record["seq"], json!(i));
        }
    }

    #[test]
    fn drain_resets_every_key_to_empty() {
        let (buffer, key) = buffer();
        buffer.append(&key, json!({})).unwrap();
        assert_eq!(buffer.len(&key), Some(1));

        let drained = buffer.drain_all();
        assert_eq!(drained[&key].len(), 1);
        assert_eq!(buffer.len(&key), Some(0));

        // A second drain still reports the key, now empty.
        let drained = buffer.drain_all();
        assert!(drained[&key].is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let (buffer, _) = buffer();
        let unknown = StreamKey::new("SOLUSDT", "publicTrade");
        let err = buffer.append(&unknown, json!({})).unwrap_err();
        assert_eq!(err, BufferError::UnknownKey(unknown));
        assert_eq!(buffer.total_len(), 0);
    }

    /// Every appended record lands in exactly one drain result, under
    /// concurrent appends and drains.
    #[test]
    fn concurrent_appends_and_drains_lose_nothing() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 500;

        let (buffer, key) = buffer();
        let buffer = Arc::new(buffer);

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                let key = key.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        buffer
                            .append(&key, json!({ "id": w * PER_WRITER + i }))
                            .unwrap();
                    }
                })
            })
            .collect();

        let drainer = {
            let buffer = Arc::clone(&buffer);
            let key = key.clone();
            std::thread::spawn(move || {
                let mut collected = Vec::new();
                for _ in 0..50 {
                    let mut drained = buffer.drain_all();
                    collected.append(&mut drained.remove(&key).unwrap());
                    std::thread::yield_now();
                }
                collected
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        let mut seen = drainer.join().unwrap();

        // Final drain catches anything appended after the drainer finished.
        let mut drained = buffer.drain_all();
        seen.append(&mut drained.remove(&key).unwrap());

        let mut ids: Vec<u64> = seen
            .iter()
            .map(|record| record["id"].as_u64().unwrap())
            .collect();
        ids.sort_unstable();
        let expected: Vec<u64> = (0..(WRITERS * PER_WRITER) as u64).collect();
        assert_eq!(ids, expected, "no duplication, no loss");
    }
}
