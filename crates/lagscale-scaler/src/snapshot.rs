//! File-backed collaborators.
//!
//! Serves partition state from a JSON document instead of a live backing
//! system. The file is re-read on every call, so editing it between polls
//! simulates a moving consumer group:
//!
//! ```json
//! { "partitions": [
//!     { "partition_id": 0, "current_offset": 120, "stored_offset": 100 },
//!     { "partition_id": 1, "last_enqueued": 55, "beginning": 0, "checkpoint": 40 }
//! ] }
//! ```
//!
//! Consumer-group scalers read `current_offset`/`stored_offset`; sequence
//! scalers read `last_enqueued`/`beginning`/`is_empty`/`checkpoint`.
//!
//! Checkpoint lookups are answered from the document loaded by the last
//! `partitions()` call, so one sequence poll sees a single file version.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use lagscale_core::{
    Credentials, PartitionId, PartitionOffsets, PartitionSequenceState, SequenceCheckpoint,
};

use crate::consumer_group::OffsetSource;
use crate::error::{ScalerError, ScalerResult};
use crate::scaler::ScalerFuture;
use crate::sequence::{CheckpointStore, PartitionInfoSource, PartitionSequence};
use crate::session::SessionToken;

/// Parsed snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub partitions: Vec<SnapshotPartition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPartition {
    pub partition_id: PartitionId,
    #[serde(default)]
    pub current_offset: i64,
    #[serde(default)]
    pub stored_offset: Option<i64>,
    #[serde(default)]
    pub last_enqueued: i64,
    #[serde(default)]
    pub beginning: i64,
    #[serde(default)]
    pub is_empty: bool,
    /// Stored checkpoint; `0` or absent means never checkpointed.
    #[serde(default)]
    pub checkpoint: Option<i64>,
}

impl Snapshot {
    pub fn from_json(content: &str) -> ScalerResult<Self> {
        serde_json::from_str(content).map_err(|e| ScalerError::MalformedResponse(e.to_string()))
    }

    pub fn offsets(&self) -> Vec<PartitionOffsets> {
        self.partitions
            .iter()
            .map(|p| PartitionOffsets {
                partition_id: p.partition_id,
                current_offset: p.current_offset,
                stored_offset: p.stored_offset,
            })
            .collect()
    }

    pub fn sequences(&self) -> Vec<PartitionSequence> {
        self.partitions
            .iter()
            .map(|p| PartitionSequence {
                partition_id: p.partition_id,
                state: PartitionSequenceState {
                    last_enqueued: p.last_enqueued,
                    beginning: p.beginning,
                    is_empty: p.is_empty,
                },
            })
            .collect()
    }

    pub fn checkpoint(&self, partition: PartitionId) -> ScalerResult<Option<SequenceCheckpoint>> {
        let p = self
            .partitions
            .iter()
            .find(|p| p.partition_id == partition)
            .ok_or_else(|| ScalerError::PartitionNotFound(partition.to_string()))?;
        Ok(p.checkpoint.and_then(SequenceCheckpoint::from_stored))
    }
}

/// Collaborator reading a [`Snapshot`] from disk.
#[derive(Debug)]
pub struct SnapshotSource {
    path: PathBuf,
    /// Document behind the most recent `partitions()` answer.
    last: Mutex<Option<Snapshot>>,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> ScalerResult<Snapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ScalerError::Backend(format!("{}: {e}", self.path.display())))?;
        let snapshot = Snapshot::from_json(&content)?;
        debug!(
            path = %self.path.display(),
            partitions = snapshot.partitions.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    fn remember(&self, snapshot: &Snapshot) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
    }

    fn remembered(&self) -> Option<Snapshot> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OffsetSource for SnapshotSource {
    fn endpoint(&self) -> &str {
        self.path.to_str().unwrap_or("snapshot")
    }

    fn login<'a>(&'a self, credentials: &'a Credentials) -> ScalerFuture<'a, SessionToken> {
        Box::pin(async move { Ok(SessionToken::new(format!("snapshot:{}", credentials.username))) })
    }

    fn partition_offsets<'a>(
        &'a self,
        _session: Option<&'a SessionToken>,
        _stream: &'a str,
        _topic: &'a str,
        _consumer_group: &'a str,
    ) -> ScalerFuture<'a, Vec<PartitionOffsets>> {
        Box::pin(async move { Ok(self.load().await?.offsets()) })
    }

    fn logout<'a>(&'a self, _session: &'a SessionToken) -> ScalerFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

impl PartitionInfoSource for SnapshotSource {
    fn partitions<'a>(&'a self, _hub: &'a str) -> ScalerFuture<'a, Vec<PartitionSequence>> {
        Box::pin(async move {
            let snapshot = self.load().await?;
            self.remember(&snapshot);
            Ok(snapshot.sequences())
        })
    }
}

impl CheckpointStore for SnapshotSource {
    fn checkpoint<'a>(
        &'a self,
        _hub: &'a str,
        _consumer_group: &'a str,
        partition: PartitionId,
    ) -> ScalerFuture<'a, Option<SequenceCheckpoint>> {
        Box::pin(async move {
            let snapshot = match self.remembered() {
                Some(snapshot) => snapshot,
                None => {
                    let snapshot = self.load().await?;
                    self.remember(&snapshot);
                    snapshot
                }
            };
            snapshot.checkpoint(partition)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{ "partitions": [
        { "partition_id": 0, "current_offset": 120, "stored_offset": 100 },
        { "partition_id": 1, "last_enqueued": 55, "checkpoint": 40 },
        { "partition_id": 2, "last_enqueued": 9, "checkpoint": 0 }
    ] }"#;

    #[test]
    fn parses_both_shapes() {
        let snap = Snapshot::from_json(DOC).unwrap();
        let offsets = snap.offsets();
        assert_eq!(offsets[0].current_offset, 120);
        assert_eq!(offsets[0].stored_offset, Some(100));
        assert_eq!(offsets[1].stored_offset, None);

        let seqs = snap.sequences();
        assert_eq!(seqs[1].state.last_enqueued, 55);
        assert!(!seqs[1].state.is_empty);
    }

    #[test]
    fn zero_checkpoint_means_none() {
        let snap = Snapshot::from_json(DOC).unwrap();
        assert_eq!(snap.checkpoint(1).unwrap(), Some(SequenceCheckpoint::new(40)));
        assert_eq!(snap.checkpoint(2).unwrap(), None);
        assert!(matches!(
            snap.checkpoint(9),
            Err(ScalerError::PartitionNotFound(_))
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            Snapshot::from_json("{ partitions: 3 }"),
            Err(ScalerError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_backend_error() {
        let source = SnapshotSource::new("/nonexistent/lagscale/snapshot.json");
        assert!(matches!(source.load().await, Err(ScalerError::Backend(_))));
    }

    #[tokio::test]
    async fn reads_file_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, DOC).unwrap();

        let source = SnapshotSource::new(&path);
        let first = source.partition_offsets(None, "s", "t", "g").await.unwrap();
        assert_eq!(first.len(), 3);

        std::fs::write(&path, r#"{ "partitions": [] }"#).unwrap();
        let second = source.partition_offsets(None, "s", "t", "g").await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn checkpoints_come_from_the_polled_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.json");
        std::fs::write(&path, DOC).unwrap();

        let source = SnapshotSource::new(&path);
        let partitions = source.partitions("hub").await.unwrap();
        assert_eq!(partitions.len(), 3);

        // Edited mid-poll: lookups still answer from the version just listed.
        std::fs::write(&path, r#"{ "partitions": [] }"#).unwrap();
        for p in &partitions {
            source.checkpoint("hub", "g", p.partition_id).await.unwrap();
        }
        assert_eq!(
            source.checkpoint("hub", "g", 1).await.unwrap(),
            Some(SequenceCheckpoint::new(40))
        );

        // The next listing picks up the edit.
        assert!(source.partitions("hub").await.unwrap().is_empty());
        assert!(matches!(
            source.checkpoint("hub", "g", 1).await,
            Err(ScalerError::PartitionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn checkpoint_without_listing_loads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.json");
        std::fs::write(&path, DOC).unwrap();

        let source = SnapshotSource::new(&path);
        assert_eq!(source.checkpoint("hub", "g", 2).await.unwrap(), None);
    }
}
