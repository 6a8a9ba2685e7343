//! Shared types used across lagscale crates.

use serde::{Deserialize, Serialize};

/// Partition identifier within a stream, topic, or hub.
pub type PartitionId = u32;

/// Where a consumer group without a committed offset starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetResetPolicy {
    /// Start at the newest message; nothing counts as lag yet.
    #[default]
    Latest,
    /// Start at the oldest retained message; everything counts as lag.
    Earliest,
}

impl OffsetResetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetResetPolicy::Latest => "latest",
            OffsetResetPolicy::Earliest => "earliest",
        }
    }
}

/// Offsets of one partition for one consumer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    pub partition_id: PartitionId,
    /// Offset of the newest message in the partition.
    pub current_offset: i64,
    /// Offset the consumer group last committed, if any.
    pub stored_offset: Option<i64>,
}
