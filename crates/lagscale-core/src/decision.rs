//! Scale decisions and the metric shapes reported to the autoscaler.

use serde::{Deserialize, Serialize};

use crate::aggregate::LagTotals;

/// How the host autoscaler interprets the target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MetricTargetType {
    /// Target is per replica (`metric / replicas`).
    AverageValue,
    /// Target is compared against the raw metric.
    Value,
}

/// Static descriptor of the external metric a scaler serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric_name: String,
    pub target_type: MetricTargetType,
    /// Target value in milli-units.
    pub target_milli: i64,
}

impl MetricSpec {
    pub fn average_value(metric_name: impl Into<String>, target: i64) -> Self {
        Self {
            metric_name: metric_name.into(),
            target_type: MetricTargetType::AverageValue,
            target_milli: target.saturating_mul(1000),
        }
    }
}

/// One external metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric_name: String,
    /// Value in milli-units (`value * 1000`, rounded).
    pub milli_value: i64,
}

impl MetricValue {
    pub fn milli(metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            milli_value: to_milli(value),
        }
    }

    /// The sample converted back to whole units.
    pub fn value(&self) -> f64 {
        self.milli_value as f64 / 1000.0
    }
}

/// `value * 1000`, rounded. Non-finite input maps to `0`; out-of-range
/// input saturates.
pub fn to_milli(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    (value * 1000.0).round() as i64
}

/// `(metric value, is active)` for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMetric {
    /// Value to report; may be capped.
    pub value: f64,
    pub is_active: bool,
}

impl ScaleMetric {
    /// Decide activation on `activation_value` while reporting `value`.
    pub fn evaluate(value: i64, activation_value: i64, activation_threshold: i64) -> Self {
        Self {
            value: value as f64,
            is_active: activation_value > activation_threshold,
        }
    }

    /// Scale on the capped total, activate on the persistent-inclusive one.
    pub fn from_totals(totals: &LagTotals, activation_threshold: i64) -> Self {
        Self::evaluate(
            totals.total_lag,
            totals.total_lag_with_persistent,
            activation_threshold,
        )
    }

    pub fn to_metric_value(&self, metric_name: &str) -> MetricValue {
        MetricValue::milli(metric_name, self.value)
    }
}

/// Build an indexed external metric name: `s{index}-{normalized}`.
///
/// `parts` are joined with `-` before normalization.
pub fn metric_name(trigger_index: usize, parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");
    format!("s{trigger_index}-{}", normalize_metric_name(&joined))
}

/// Lowercase and replace characters that are not valid in a metric name.
pub fn normalize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '.' | ':' | '%' | '_' => '-',
            c if c.is_whitespace() => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
