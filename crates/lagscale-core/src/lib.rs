//! lagscale-core — lag aggregation and scale-decision arithmetic.
//!
//! Pure, synchronous building blocks shared by every scaler adapter:
//!
//! ```text
//! per-partition lags ──► aggregate_lag() ──┐
//!                                          ├──► ScaleMetric ──► MetricValue (milli)
//! sequence + checkpoint ► unprocessed_events()
//! ```
//!
//! Nothing here performs I/O or holds state between polls; the functions
//! are safe to call from any number of adapters concurrently.

pub mod aggregate;
pub mod config;
pub mod decision;
pub mod error;
pub mod sequence;
pub mod types;

pub use aggregate::{aggregate_lag, CappingStrategy, LagPolicy, LagTotals, UpperBound};
pub use config::{
    ConsumerGroupSettings, ConsumerGroupTrigger, Credentials, ScalerConfig, SequenceSettings,
    SequenceTrigger, TriggerConfig,
};
pub use decision::{metric_name, MetricSpec, MetricTargetType, MetricValue, ScaleMetric};
pub use error::{ConfigError, ConfigResult};
pub use sequence::{
    unprocessed_events, wrapping_distance, PartitionSequenceState, SequenceCheckpoint,
};
pub use types::*;
