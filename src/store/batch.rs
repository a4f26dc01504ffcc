//! Write buffer for batched hash record inserts.

use super::FileRecord;

/// Default number of records buffered before a bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Pending file records owned by one [`HashStore`](super::HashStore).
#[derive(Debug)]
pub struct WriteBatch {
    threshold: usize,
    pending: Vec<FileRecord>,
}

impl WriteBatch {
    /// Create an empty batch that reports full at `threshold` records.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            pending: Vec::with_capacity(threshold.min(DEFAULT_BATCH_SIZE)),
        }
    }

    /// Buffer a record. Returns `true` once the threshold is reached.
    pub fn push(&mut self, record: FileRecord) -> bool {
        self.pending.push(record);
        self.is_full()
    }

    /// Whether the buffer has reached its threshold.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Take all buffered records, leaving the batch empty.
    pub fn take(&mut self) -> Vec<FileRecord> {
        std::mem::take(&mut self.pending)
    }
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
