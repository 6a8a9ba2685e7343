//! Interval poller — drives one scaler until shutdown.
//!
//! Asks the scaler for its metric spec once, then polls
//! `metrics_and_activity` on a fixed interval and hands every result to a
//! callback. Failed polls are logged and retried on the next tick only.

use std::time::Duration;

use tracing::{debug, error, info};

use lagscale_core::MetricValue;

use crate::error::ScalerResult;
use crate::scaler::Scaler;

/// Result of one successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub metric_name: String,
    pub metrics: Vec<MetricValue>,
    pub is_active: bool,
}

/// Callback type invoked after each successful poll.
pub type PollCallback = Box<dyn Fn(&PollOutcome) + Send + Sync>;

pub struct Poller {
    scaler: Box<dyn Scaler>,
    metric_name: String,
    interval: Duration,
    on_poll: Option<PollCallback>,
    failures: u64,
}

impl Poller {
    pub fn new(scaler: Box<dyn Scaler>, interval: Duration) -> Self {
        let metric_name = scaler
            .metric_spec_for_scaling()
            .into_iter()
            .next()
            .map(|s| s.metric_name)
            .unwrap_or_default();
        Self {
            scaler,
            metric_name,
            interval,
            on_poll: None,
            failures: 0,
        }
    }

    /// Set the callback that receives poll results.
    pub fn with_callback(mut self, f: PollCallback) -> Self {
        self.on_poll = Some(f);
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Number of failed polls so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Poll the scaler once.
    pub async fn poll_once(&mut self) -> ScalerResult<PollOutcome> {
        let (metrics, is_active) = self.scaler.metrics_and_activity(&self.metric_name).await?;
        let outcome = PollOutcome {
            metric_name: self.metric_name.clone(),
            metrics,
            is_active,
        };
        if let Some(ref f) = self.on_poll {
            f(&outcome);
        }
        Ok(outcome)
    }

    /// Run the poll loop until `shutdown` changes, then close the scaler.
    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            metric = %self.metric_name,
            interval_ms = self.interval.as_millis() as u64,
            "poller started"
        );

        loop {
            match self.poll_once().await {
                Ok(outcome) => debug!(
                    metric = %outcome.metric_name,
                    active = outcome.is_active,
                    "poll complete"
                ),
                Err(e) => {
                    self.failures += 1;
                    error!(metric = %self.metric_name, error = %e, "poll failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }
        }

        if let Err(e) = self.scaler.close().await {
            debug!(error = %e, "scaler close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use lagscale_core::MetricSpec;

    use crate::error::ScalerError;
    use crate::scaler::{MetricsAndActivity, ScalerFuture};

    /// Scaler whose every other poll fails.
    struct FlakyScaler {
        polls: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl Scaler for FlakyScaler {
        fn metric_spec_for_scaling(&self) -> Vec<MetricSpec> {
            vec![MetricSpec::average_value("s0-flaky", 5)]
        }

        fn metrics_and_activity<'a>(
            &'a mut self,
            metric_name: &'a str,
        ) -> ScalerFuture<'a, MetricsAndActivity> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n % 2 == 1 {
                    return Err(ScalerError::Backend("flaky".into()));
                }
                Ok((vec![MetricValue::milli(metric_name, n as f64)], n > 0))
            })
        }

        fn close(&mut self) -> ScalerFuture<'_, ()> {
            self.closed.store(true, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn flaky() -> (FlakyScaler, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let polls = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        (
            FlakyScaler {
                polls: polls.clone(),
                closed: closed.clone(),
            },
            polls,
            closed,
        )
    }

    #[tokio::test]
    async fn poll_once_uses_spec_metric_name() {
        let (scaler, _, _) = flaky();
        let mut poller = Poller::new(Box::new(scaler), Duration::from_secs(1));
        assert_eq!(poller.metric_name(), "s0-flaky");

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.metrics[0].metric_name, "s0-flaky");
        assert!(!outcome.is_active);
        assert!(poller.poll_once().await.is_err());
    }

    #[tokio::test]
    async fn callback_sees_successful_polls() {
        let (scaler, _, _) = flaky();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let mut poller = Poller::new(Box::new(scaler), Duration::from_secs(1)).with_callback(
            Box::new(move |_| {
                seen_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        for _ in 0..4 {
            let _ = poller.poll_once().await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_shutdown_then_closes() {
        let (scaler, polls, closed) = flaky();
        let poller = Poller::new(Box::new(scaler), Duration::from_secs(10));
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = tokio::spawn(poller.run(rx));
        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(closed.load(Ordering::SeqCst));
    }
}
