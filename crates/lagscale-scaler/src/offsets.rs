//! Persistent-lag detection.
//!
//! Remembers the stored offset each partition had on the previous poll. A
//! partition whose consumer did not move between polls is likely stuck on
//! a message it cannot process; scaling out will not help it.
//!
//! Each poll is bracketed by [`PersistentLagTracker::begin_cycle`] and
//! [`PersistentLagTracker::finish_cycle`]; partitions not observed in a
//! completed cycle are forgotten, so the map never outgrows the current
//! partition set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use lagscale_core::PartitionId;

/// How a partition's stored offset moved since the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetProgress {
    /// No previous observation.
    First,
    /// Same stored offset as last poll.
    Unchanged,
    /// The consumer committed new messages.
    Advanced,
}

#[derive(Debug, Default)]
pub struct PersistentLagTracker {
    previous: HashMap<PartitionId, i64>,
    seen: HashSet<PartitionId>,
}

impl PersistentLagTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a poll. Clears leftovers of a cycle that was aborted by an
    /// error.
    pub fn begin_cycle(&mut self) {
        self.seen.clear();
    }

    /// Record `stored_offset` for `partition` and report how it moved.
    pub fn observe(&mut self, partition: PartitionId, stored_offset: i64) -> OffsetProgress {
        self.seen.insert(partition);
        match self.previous.insert(partition, stored_offset) {
            None => OffsetProgress::First,
            Some(prev) if prev == stored_offset => OffsetProgress::Unchanged,
            Some(_) => OffsetProgress::Advanced,
        }
    }

    /// Finish a poll, dropping partitions that were not observed in it.
    /// Returns how many were dropped.
    pub fn finish_cycle(&mut self) -> usize {
        let before = self.previous.len();
        let seen = std::mem::take(&mut self.seen);
        self.previous.retain(|id, _| seen.contains(id));
        let dropped = before - self.previous.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.previous.len(), "forgot vanished partitions");
        }
        dropped
    }

    pub fn previous(&self, partition: PartitionId) -> Option<i64> {
        self.previous.get(&partition).copied()
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_then_unchanged_then_advanced() {
        let mut t = PersistentLagTracker::new();
        t.begin_cycle();
        assert_eq!(t.observe(0, 10), OffsetProgress::First);
        t.finish_cycle();

        t.begin_cycle();
        assert_eq!(t.observe(0, 10), OffsetProgress::Unchanged);
        t.finish_cycle();

        t.begin_cycle();
        assert_eq!(t.observe(0, 15), OffsetProgress::Advanced);
        t.finish_cycle();
        assert_eq!(t.previous(0), Some(15));
    }

    #[test]
    fn unseen_partitions_are_dropped() {
        let mut t = PersistentLagTracker::new();
        t.begin_cycle();
        t.observe(0, 1);
        t.observe(1, 1);
        t.observe(2, 1);
        assert_eq!(t.finish_cycle(), 0);
        assert_eq!(t.len(), 3);

        // Partition count shrank.
        t.begin_cycle();
        t.observe(0, 2);
        assert_eq!(t.finish_cycle(), 2);
        assert_eq!(t.len(), 1);
        assert_eq!(t.previous(1), None);
    }

    #[test]
    fn aborted_cycle_does_not_leak_seen_set() {
        let mut t = PersistentLagTracker::new();
        t.begin_cycle();
        t.observe(0, 1);
        t.observe(1, 1);
        t.finish_cycle();

        // Cycle aborted after observing partition 1 only.
        t.begin_cycle();
        t.observe(1, 1);

        t.begin_cycle();
        t.observe(0, 1);
        assert_eq!(t.finish_cycle(), 1);
        assert_eq!(t.previous(1), None);
    }
}
