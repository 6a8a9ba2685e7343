//! Unprocessed-item counts over circular sequence numbers.
//!
//! A partition hands out sequence numbers from `0` up to `i64::MAX` and
//! then starts over. Comparing a checkpoint with the last enqueued number
//! therefore has three readings:
//!
//! ```text
//! checkpoint == last            → nothing to do
//! checkpoint behind last        → last - checkpoint
//! checkpoint "ahead" of last    → either the producer wrapped (distance
//!                                 the long way round) or the partition
//!                                 info we read is stale (distance the
//!                                 short way round is tiny)
//! ```
//!
//! All distance arithmetic is done on `u64` through [`wrapping_distance`].

use serde::{Deserialize, Serialize};

/// Size of the sequence-number space. Sequence numbers are non-negative
/// `i64` values and the counter restarts after `i64::MAX`.
pub const SEQUENCE_SPACE: u64 = i64::MAX as u64;

/// Default tolerance (in sequence numbers) for a checkpoint that is ahead of
/// the reported last enqueued sequence number because of stale partition
/// information.
pub const DEFAULT_STALE_PARTITION_INFO_THRESHOLD: u64 = 10_000;

/// Last durably processed sequence number of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCheckpoint {
    pub sequence_number: i64,
}

impl SequenceCheckpoint {
    pub fn new(sequence_number: i64) -> Self {
        Self { sequence_number }
    }

    /// Interpret a stored checkpoint where `0` (or anything negative) means
    /// nothing has been processed yet.
    pub fn from_stored(sequence_number: i64) -> Option<Self> {
        (sequence_number > 0).then_some(Self { sequence_number })
    }
}

/// Sequence bounds of a partition as reported by the backing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionSequenceState {
    /// Highest sequence number produced so far.
    pub last_enqueued: i64,
    /// Oldest sequence number still retained.
    pub beginning: i64,
    /// The backing system reports the partition as holding no events.
    #[serde(default)]
    pub is_empty: bool,
}

/// Forward distance from `from` to `to` in the sequence space.
///
/// Both values are reduced into `[0, SEQUENCE_SPACE)` first (negative
/// values are treated as `0`). The result is the number of steps a counter
/// at `from` must advance to reach `to`, wrapping at [`SEQUENCE_SPACE`].
pub fn wrapping_distance(from: i64, to: i64) -> u64 {
    let from = normalize(from);
    let to = normalize(to);
    if to >= from {
        to - from
    } else {
        (SEQUENCE_SPACE - from) + to
    }
}

fn normalize(seq: i64) -> u64 {
    if seq <= 0 {
        0
    } else {
        seq as u64 % SEQUENCE_SPACE
    }
}

/// Count of events in a partition that has never been checkpointed.
///
/// The untouched partition is marked by `is_empty`. A non-empty partition
/// whose `beginning` equals `last_enqueued` still holds that one event.
pub fn unprocessed_without_checkpoint(state: &PartitionSequenceState) -> i64 {
    if state.is_empty || state.last_enqueued < 0 {
        return 0;
    }
    if state.last_enqueued == state.beginning {
        return 1;
    }
    (state.last_enqueued - state.beginning).max(0)
}

/// Unprocessed events between `checkpoint` and the partition's last
/// enqueued sequence number.
///
/// A checkpoint ahead of the partition by at most
/// `stale_partition_info_threshold` (measured the short way round) is read
/// as stale partition info and yields `0`. Everything else is the forward
/// distance around the sequence ring. A checkpoint at sequence `0` or
/// below counts as no checkpoint. Never negative.
pub fn unprocessed_events(
    state: &PartitionSequenceState,
    checkpoint: Option<SequenceCheckpoint>,
    stale_partition_info_threshold: u64,
) -> i64 {
    let Some(checkpoint) = checkpoint.filter(|c| c.sequence_number > 0) else {
        return unprocessed_without_checkpoint(state);
    };
    if state.is_empty {
        return 0;
    }

    let last = state.last_enqueued;
    let ahead = wrapping_distance(checkpoint.sequence_number, last);
    if ahead == 0 {
        return 0;
    }

    let behind = wrapping_distance(last, checkpoint.sequence_number);
    if behind < ahead && behind <= stale_partition_info_threshold {
        return 0;
    }

    i64::try_from(ahead).unwrap_or(i64::MAX)
}
