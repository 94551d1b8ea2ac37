//! Fixed-capacity row buffer between the source and the loader

use crate::record::RawRecord;

/// Default number of rows committed per transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Largest accepted batch size; the buffer for a batch is reserved up front
pub const MAX_BATCH_SIZE: usize = 1_000_000;

/// Buffers rows until `capacity` is reached
///
/// The backing allocation is reserved once and reused for every batch.
#[derive(Debug)]
pub struct BatchAccumulator {
    records: Vec<RawRecord>,
    capacity: usize,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a row; callers flush once [`is_full`](Self::is_full) reports true
    pub fn add(&mut self, record: RawRecord) {
        debug_assert!(self.records.len() < self.capacity, "batch overfilled");
        self.records.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Configured batch size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The in-flight batch
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Empty the buffer, keeping its allocation
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: usize) -> RawRecord {
        RawRecord::new(vec![id.to_string()])
    }

    #[test]
    fn test_full_at_capacity() {
        let mut batch = BatchAccumulator::new(3);
        batch.add(row(1));
        batch.add(row(2));
        assert!(!batch.is_full());

        batch.add(row(3));
        assert!(batch.is_full());
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut batch = BatchAccumulator::new(1000);
        for i in 0..1000 {
            batch.add(row(i));
        }
        let reserved = batch.records.capacity();

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.records.capacity(), reserved);
        assert!(reserved >= 1000);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(BatchAccumulator::default().capacity(), DEFAULT_BATCH_SIZE);
    }
}
