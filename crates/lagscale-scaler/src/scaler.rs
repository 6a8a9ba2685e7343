//! The contract every scaler adapter fulfills.
//!
//! The poller calls [`Scaler::metric_spec_for_scaling`] once to learn the
//! metric name and target, then [`Scaler::metrics_and_activity`] on every
//! interval. Calls on one instance never overlap; `&mut self` enforces it.

use std::future::Future;
use std::pin::Pin;

use lagscale_core::{MetricSpec, MetricValue};

use crate::error::ScalerResult;

/// Boxed future alias for scaler and collaborator calls.
pub type ScalerFuture<'a, T> = Pin<Box<dyn Future<Output = ScalerResult<T>> + Send + 'a>>;

/// Metric samples for one poll plus whether the scale target should be
/// active at all.
pub type MetricsAndActivity = (Vec<MetricValue>, bool);

pub trait Scaler: Send {
    /// Static metric descriptor derived from configuration. Never touches
    /// the backing system.
    fn metric_spec_for_scaling(&self) -> Vec<MetricSpec>;

    /// Fetch fresh state, compute the metric, and decide activation.
    ///
    /// Backing-system failures are returned as-is; retrying is the
    /// poller's job.
    fn metrics_and_activity<'a>(
        &'a mut self,
        metric_name: &'a str,
    ) -> ScalerFuture<'a, MetricsAndActivity>;

    /// Release held resources. Idempotent; cleanup failures are logged,
    /// not returned.
    fn close(&mut self) -> ScalerFuture<'_, ()>;
}
