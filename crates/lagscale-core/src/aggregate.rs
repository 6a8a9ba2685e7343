//! Partition lag aggregation.
//!
//! Folds a per-partition lag breakdown into the single value a consumer
//! group is scaled on. Three policy flags decide whether (and how) the
//! total is capped:
//!
//! ```text
//! allow_idle && !limit && !even   → Uncapped
//! otherwise                       → Capped { balance: even, bound }
//!     bound = PartitionsWithLag   if limit
//!           = TotalPartitions     otherwise
//! ```
//!
//! The persistent-inclusive total is never capped; it is what activation
//! is decided on.

use serde::{Deserialize, Serialize};

/// Which partition count the capped lag may not exceed (in units of
/// `lag_threshold`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpperBound {
    /// Every partition considered by the scaler.
    TotalPartitions,
    /// Only partitions that currently report lag.
    PartitionsWithLag,
}

/// Capping behaviour resolved once from the three policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CappingStrategy {
    /// One unit of scale per `lag_threshold` of lag, no limit.
    Uncapped,
    /// Cap at `bound * lag_threshold`, optionally rounding up to a
    /// replica count that divides the partitions evenly first.
    Capped { balance: bool, bound: UpperBound },
}

impl CappingStrategy {
    pub fn from_flags(
        allow_idle_consumers: bool,
        limit_to_partitions_with_lag: bool,
        ensure_even_distribution: bool,
    ) -> Self {
        if allow_idle_consumers && !limit_to_partitions_with_lag && !ensure_even_distribution {
            return Self::Uncapped;
        }
        let bound = if limit_to_partitions_with_lag {
            UpperBound::PartitionsWithLag
        } else {
            UpperBound::TotalPartitions
        };
        Self::Capped {
            balance: ensure_even_distribution,
            bound,
        }
    }
}

/// Validated lag policy of a consumer-group style trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagPolicy {
    /// Target lag per replica. Always positive once validated.
    pub lag_threshold: i64,
    pub strategy: CappingStrategy,
}

impl LagPolicy {
    pub fn new(
        lag_threshold: i64,
        allow_idle_consumers: bool,
        limit_to_partitions_with_lag: bool,
        ensure_even_distribution: bool,
    ) -> Self {
        Self {
            lag_threshold,
            strategy: CappingStrategy::from_flags(
                allow_idle_consumers,
                limit_to_partitions_with_lag,
                ensure_even_distribution,
            ),
        }
    }
}

/// Result of aggregating one poll's partition lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LagTotals {
    /// Lag to scale on (possibly capped or balanced).
    pub total_lag: i64,
    /// Raw lag including persistent lag. Drives activation.
    pub total_lag_with_persistent: i64,
    pub partitions_with_lag: i64,
    pub total_partitions: i64,
}

/// Aggregate per-partition lags under `policy`.
///
/// `partition_lags` and `partition_lags_with_persistent` are parallel; the
/// partition count is taken from `partition_lags`. Negative entries count
/// as zero. Sums saturate instead of overflowing.
pub fn aggregate_lag(
    partition_lags: &[i64],
    partition_lags_with_persistent: &[i64],
    policy: &LagPolicy,
) -> LagTotals {
    let mut total_lag: i64 = 0;
    let mut partitions_with_lag: i64 = 0;
    for &lag in partition_lags {
        if lag > 0 {
            total_lag = total_lag.saturating_add(lag);
            partitions_with_lag += 1;
        }
    }

    let total_lag_with_persistent = partition_lags_with_persistent
        .iter()
        .filter(|&&lag| lag > 0)
        .fold(0i64, |acc, &lag| acc.saturating_add(lag));

    let total_partitions = partition_lags.len() as i64;
    let threshold = policy.lag_threshold;

    if let CappingStrategy::Capped { balance, bound } = policy.strategy
        && threshold > 0
    {
        if balance {
            let factor = balancing_factor(total_lag, total_partitions, threshold);
            total_lag = factor.saturating_mul(threshold);
        }

        let upper_bound = match bound {
            UpperBound::TotalPartitions => total_partitions,
            UpperBound::PartitionsWithLag => partitions_with_lag,
        };

        if upper_bound > 0 && total_lag / threshold > upper_bound {
            total_lag = upper_bound.saturating_mul(threshold);
        }
    }

    LagTotals {
        total_lag,
        total_lag_with_persistent,
        partitions_with_lag,
        total_partitions,
    }
}

/// Smallest factor of `total_partitions` whose replica count covers
/// `total_lag`, falling back to `total_partitions`.
///
/// Scaling to a factor keeps every consumer on the same number of
/// partitions.
pub fn balancing_factor(total_lag: i64, total_partitions: i64, lag_threshold: i64) -> i64 {
    factors(total_partitions)
        .into_iter()
        .find(|f| f.saturating_mul(lag_threshold) >= total_lag)
        .unwrap_or(total_partitions)
}

/// All positive divisors of `n` in ascending order. Empty for `n < 1`.
pub fn factors(n: i64) -> Vec<i64> {
    if n < 1 {
        return Vec::new();
    }
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i: i64 = 1;
    while i <= n / i {
        if n % i == 0 {
            low.push(i);
            if i != n / i {
                high.push(n / i);
            }
        }
        i += 1;
    }
    low.extend(high.into_iter().rev());
    low
}
