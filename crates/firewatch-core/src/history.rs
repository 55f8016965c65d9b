//! Bounded rolling history of recent readings.

use std::collections::VecDeque;

use firewatch_types::Reading;

/// Fixed-capacity FIFO of the most recent readings, oldest first.
///
/// Appending at capacity evicts the oldest entry before the new one goes
/// in, so the length never exceeds [`capacity`](Self::capacity).
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` readings.
    ///
    /// A zero capacity is raised to one; config validation rejects zero
    /// before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest entry first when full.
    ///
    /// Returns the evicted reading, if any.
    pub fn append(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(reading);
        evicted
    }

    /// Copy of every entry, oldest to newest.
    pub fn all(&self) -> Vec<Reading> {
        self.entries.iter().cloned().collect()
    }

    /// The most recently appended reading, or `None` when empty.
    pub fn latest(&self) -> Option<&Reading> {
        self.entries.back()
    }

    /// Number of readings held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reading has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of readings held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(100)
    }
}
