//! Sequence-number lag scaler.
//!
//! For partitioned logs that hand out circular sequence numbers and keep
//! consumer progress as checkpoints in a separate store. Each partition's
//! unprocessed count comes from [`unprocessed_events`]; the sum is capped
//! so the scale target never asks for more replicas than partitions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lagscale_core::{
    aggregate_lag, metric_name, unprocessed_events, LagPolicy, MetricSpec, PartitionId,
    PartitionSequenceState, ScaleMetric, SequenceCheckpoint, SequenceSettings, SequenceTrigger,
};

use crate::error::{ScalerError, ScalerResult};
use crate::scaler::{MetricsAndActivity, Scaler, ScalerFuture};

/// Sequence bounds of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSequence {
    pub partition_id: PartitionId,
    #[serde(flatten)]
    pub state: PartitionSequenceState,
}

/// Reports partition sequence bounds of a hub.
pub trait PartitionInfoSource: Send + Sync {
    fn partitions<'a>(&'a self, hub: &'a str) -> ScalerFuture<'a, Vec<PartitionSequence>>;
}

/// Reads consumer checkpoints.
///
/// `Ok(None)` means the partition was never checkpointed. A store that
/// does not exist at all answers [`ScalerError::CheckpointStoreMissing`].
pub trait CheckpointStore: Send + Sync {
    fn checkpoint<'a>(
        &'a self,
        hub: &'a str,
        consumer_group: &'a str,
        partition: PartitionId,
    ) -> ScalerFuture<'a, Option<SequenceCheckpoint>>;
}

pub struct SequenceScaler {
    settings: SequenceSettings,
    metric_name: String,
    partitions: Arc<dyn PartitionInfoSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    closed: bool,
}

impl SequenceScaler {
    pub fn new(
        settings: SequenceSettings,
        partitions: Arc<dyn PartitionInfoSource>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let metric_name = metric_name(
            settings.trigger_index,
            &["sequence", &settings.hub, &settings.consumer_group],
        );
        Self {
            settings,
            metric_name,
            partitions,
            checkpoints,
            closed: false,
        }
    }

    pub fn from_trigger(
        trigger: &SequenceTrigger,
        partitions: Arc<dyn PartitionInfoSource>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> ScalerResult<Self> {
        Ok(Self::new(trigger.validate()?, partitions, checkpoints))
    }

    pub fn settings(&self) -> &SequenceSettings {
        &self.settings
    }

    async fn unprocessed_in_partition(&self, p: &PartitionSequence) -> ScalerResult<i64> {
        if p.state.is_empty {
            return Ok(0);
        }

        let checkpoint = match self
            .checkpoints
            .checkpoint(&self.settings.hub, &self.settings.consumer_group, p.partition_id)
            .await
        {
            Ok(cp) => cp,
            Err(ScalerError::CheckpointStoreMissing(store)) => {
                debug!(
                    %store,
                    partition = p.partition_id,
                    "checkpoint store not found, counting without checkpoint"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let unprocessed = unprocessed_events(
            &p.state,
            checkpoint,
            self.settings.stale_partition_info_threshold,
        );
        debug!(
            partition = p.partition_id,
            last_enqueued = p.state.last_enqueued,
            checkpoint = checkpoint.map(|c| c.sequence_number),
            unprocessed,
            "partition unprocessed events"
        );
        Ok(unprocessed)
    }

    async fn poll(&mut self, metric_name: &str) -> ScalerResult<MetricsAndActivity> {
        if self.closed {
            return Err(ScalerError::Closed);
        }

        let partitions = self.partitions.partitions(&self.settings.hub).await?;
        let mut counts = Vec::with_capacity(partitions.len());
        for p in &partitions {
            counts.push(self.unprocessed_in_partition(p).await?);
        }

        // Never ask for more replicas than partitions.
        let policy = LagPolicy::new(self.settings.unprocessed_event_threshold, false, false, false);
        let totals = aggregate_lag(&counts, &counts, &policy);
        let metric = ScaleMetric::from_totals(
            &totals,
            self.settings.activation_unprocessed_event_threshold,
        );

        debug!(
            hub = %self.settings.hub,
            consumer_group = %self.settings.consumer_group,
            partitions = totals.total_partitions,
            unprocessed = totals.total_lag_with_persistent,
            reported = totals.total_lag,
            active = metric.is_active,
            "sequence lag"
        );

        Ok((vec![metric.to_metric_value(metric_name)], metric.is_active))
    }
}

impl Scaler for SequenceScaler {
    fn metric_spec_for_scaling(&self) -> Vec<MetricSpec> {
        vec![MetricSpec::average_value(
            self.metric_name.clone(),
            self.settings.unprocessed_event_threshold,
        )]
    }

    fn metrics_and_activity<'a>(
        &'a mut self,
        metric_name: &'a str,
    ) -> ScalerFuture<'a, MetricsAndActivity> {
        Box::pin(self.poll(metric_name))
    }

    fn close(&mut self) -> ScalerFuture<'_, ()> {
        self.closed = true;
        Box::pin(async { Ok(()) })
    }
}
