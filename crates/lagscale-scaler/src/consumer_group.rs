//! Consumer-group lag scaler.
//!
//! Scales on the lag between each partition's newest offset and the offset
//! a consumer group last committed:
//!
//! ```text
//! OffsetSource::partition_offsets()
//!   → partition_limitation filter
//!   → per-partition (lag, lag_with_persistent)
//!   → aggregate_lag(policy)
//!   → ScaleMetric { capped lag, active if uncapped lag > activation }
//! ```
//!
//! Partitions without a committed offset follow `offset_reset_policy`:
//! `latest` counts as lag 1, `earliest` counts every retained message, and
//! `scale_to_zero_on_invalid_offset` turns either into 0. The backing
//! client does not say *why* an offset is missing, so a partition that
//! failed to report one is treated the same way.

use std::sync::Arc;

use tracing::{debug, warn};

use lagscale_core::{
    aggregate_lag, metric_name, ConsumerGroupSettings, ConsumerGroupTrigger, Credentials,
    MetricSpec, OffsetResetPolicy, PartitionOffsets, ScaleMetric,
};

use crate::error::{ScalerError, ScalerResult};
use crate::offsets::{OffsetProgress, PersistentLagTracker};
use crate::scaler::{MetricsAndActivity, Scaler, ScalerFuture};
use crate::session::{session_key, SessionCache, SessionToken};

/// Backing system of a consumer-group scaler.
pub trait OffsetSource: Send + Sync {
    /// Name used in session cache keys.
    fn endpoint(&self) -> &str;

    fn login<'a>(&'a self, credentials: &'a Credentials) -> ScalerFuture<'a, SessionToken>;

    /// Newest and committed offsets for every partition of `topic`.
    fn partition_offsets<'a>(
        &'a self,
        session: Option<&'a SessionToken>,
        stream: &'a str,
        topic: &'a str,
        consumer_group: &'a str,
    ) -> ScalerFuture<'a, Vec<PartitionOffsets>>;

    fn logout<'a>(&'a self, session: &'a SessionToken) -> ScalerFuture<'a, ()>;
}

pub struct ConsumerGroupScaler {
    settings: ConsumerGroupSettings,
    metric_name: String,
    source: Arc<dyn OffsetSource>,
    sessions: Arc<dyn SessionCache>,
    session: Option<SessionToken>,
    tracker: PersistentLagTracker,
    closed: bool,
}

impl ConsumerGroupScaler {
    pub fn new(
        settings: ConsumerGroupSettings,
        source: Arc<dyn OffsetSource>,
        sessions: Arc<dyn SessionCache>,
    ) -> Self {
        let metric_name = metric_name(
            settings.trigger_index,
            &["consumer-group", &settings.stream, &settings.topic],
        );
        Self {
            settings,
            metric_name,
            source,
            sessions,
            session: None,
            tracker: PersistentLagTracker::new(),
            closed: false,
        }
    }

    /// Validate `trigger` and build a scaler. Fails fast on bad config.
    pub fn from_trigger(
        trigger: &ConsumerGroupTrigger,
        source: Arc<dyn OffsetSource>,
        sessions: Arc<dyn SessionCache>,
    ) -> ScalerResult<Self> {
        Ok(Self::new(trigger.validate()?, source, sessions))
    }

    pub fn settings(&self) -> &ConsumerGroupSettings {
        &self.settings
    }

    fn session_key(&self) -> Option<String> {
        self.settings
            .credentials
            .as_ref()
            .map(|c| session_key(self.source.endpoint(), c))
    }

    async fn ensure_session(&mut self) -> ScalerResult<Option<SessionToken>> {
        let (Some(credentials), Some(key)) = (self.settings.credentials.clone(), self.session_key())
        else {
            return Ok(None);
        };

        if let Some(token) = self.sessions.get(&key) {
            self.session = Some(token.clone());
            return Ok(Some(token));
        }

        let token = self.source.login(&credentials).await?;
        debug!(stream = %self.settings.stream, "logged in to offset source");
        self.sessions.set(&key, token.clone());
        self.session = Some(token.clone());
        Ok(Some(token))
    }

    /// Lag of one partition as `(lag, lag_with_persistent)`.
    fn partition_lag(&mut self, p: &PartitionOffsets) -> (i64, i64) {
        let Some(stored) = p.stored_offset else {
            let lag = if self.settings.scale_to_zero_on_invalid_offset {
                0
            } else {
                match self.settings.offset_reset_policy {
                    OffsetResetPolicy::Latest => 1,
                    OffsetResetPolicy::Earliest => p.current_offset.saturating_add(1).max(0),
                }
            };
            debug!(
                partition = p.partition_id,
                policy = self.settings.offset_reset_policy.as_str(),
                lag,
                "no committed offset"
            );
            return (lag, lag);
        };

        let lag = p.current_offset.saturating_sub(stored).max(0);
        if !self.settings.exclude_persistent_lag {
            return (lag, lag);
        }

        match self.tracker.observe(p.partition_id, stored) {
            OffsetProgress::Unchanged if lag > 0 => {
                debug!(partition = p.partition_id, stored, lag, "persistent lag excluded");
                (0, lag)
            }
            _ => (lag, lag),
        }
    }

    async fn poll(&mut self, metric_name: &str) -> ScalerResult<MetricsAndActivity> {
        if self.closed {
            return Err(ScalerError::Closed);
        }

        let session = self.ensure_session().await?;
        let fetched = self
            .source
            .partition_offsets(
                session.as_ref(),
                &self.settings.stream,
                &self.settings.topic,
                &self.settings.consumer_group,
            )
            .await;

        let offsets = match fetched {
            Ok(offsets) => offsets,
            Err(e) => {
                // A stale session looks like any other failure; log in again next poll.
                if let Some(key) = self.session_key() {
                    self.sessions.remove(&key);
                    self.session = None;
                }
                return Err(e);
            }
        };

        let limitation = &self.settings.partition_limitation;
        let considered: Vec<PartitionOffsets> = if limitation.is_empty() {
            offsets
        } else {
            let kept: Vec<_> = offsets
                .into_iter()
                .filter(|p| limitation.contains(&p.partition_id))
                .collect();
            if kept.len() < limitation.len() {
                debug!(
                    configured = limitation.len(),
                    found = kept.len(),
                    "some limited partitions were not reported"
                );
            }
            kept
        };

        self.tracker.begin_cycle();
        let mut lags = Vec::with_capacity(considered.len());
        let mut lags_with_persistent = Vec::with_capacity(considered.len());
        for p in &considered {
            let (lag, with_persistent) = self.partition_lag(p);
            lags.push(lag);
            lags_with_persistent.push(with_persistent);
        }
        self.tracker.finish_cycle();

        let totals = aggregate_lag(&lags, &lags_with_persistent, &self.settings.policy);
        let metric = ScaleMetric::from_totals(&totals, self.settings.activation_lag_threshold);

        debug!(
            stream = %self.settings.stream,
            topic = %self.settings.topic,
            consumer_group = %self.settings.consumer_group,
            partitions = totals.total_partitions,
            partitions_with_lag = totals.partitions_with_lag,
            total_lag = totals.total_lag,
            total_lag_with_persistent = totals.total_lag_with_persistent,
            active = metric.is_active,
            "consumer group lag"
        );

        Ok((vec![metric.to_metric_value(metric_name)], metric.is_active))
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let Some(token) = self.session.take() else {
            return;
        };
        if let Some(key) = self.session_key()
            && self.sessions.get(&key).as_ref() == Some(&token)
        {
            self.sessions.remove(&key);
        }
        if let Err(e) = self.source.logout(&token).await {
            debug!(error = %e, stream = %self.settings.stream, "logout failed");
        }
    }
}

impl Scaler for ConsumerGroupScaler {
    fn metric_spec_for_scaling(&self) -> Vec<MetricSpec> {
        vec![MetricSpec::average_value(
            self.metric_name.clone(),
            self.settings.policy.lag_threshold,
        )]
    }

    fn metrics_and_activity<'a>(
        &'a mut self,
        metric_name: &'a str,
    ) -> ScalerFuture<'a, MetricsAndActivity> {
        Box::pin(self.poll(metric_name))
    }

    fn close(&mut self) -> ScalerFuture<'_, ()> {
        Box::pin(async move {
            self.shutdown().await;
            Ok(())
        })
    }
}

impl Drop for ConsumerGroupScaler {
    fn drop(&mut self) {
        if !self.closed && self.session.is_some() {
            warn!(stream = %self.settings.stream, "consumer group scaler dropped without close");
        }
    }
}
