//! Trigger configuration parser.
//!
//! A scaler is described by a TOML file:
//!
//! ```toml
//! polling_interval = "30s"
//!
//! [trigger]
//! type = "consumer_group"
//! stream = "orders"
//! topic = "payments"
//! consumer_group = "billing"
//! lag_threshold = 10
//! partition_limitation = "0,1,4-7"
//! ```
//!
//! Raw structs mirror the file with optional fields; `validate()` applies
//! defaults and checks, producing immutable settings for the adapters.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::LagPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::sequence::DEFAULT_STALE_PARTITION_INFO_THRESHOLD;
use crate::types::{OffsetResetPolicy, PartitionId};

pub const DEFAULT_LAG_THRESHOLD: i64 = 10;
pub const DEFAULT_UNPROCESSED_EVENT_THRESHOLD: i64 = 64;
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);
/// Most partition ids a `partition_limitation` list may expand to.
pub const MAX_PARTITION_LIMITATION: usize = 65_536;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerConfig {
    pub polling_interval: Option<String>,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    ConsumerGroup(ConsumerGroupTrigger),
    Sequence(SequenceTrigger),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsumerGroupTrigger {
    pub trigger_index: Option<usize>,
    pub stream: Option<String>,
    pub topic: Option<String>,
    pub consumer_group: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub lag_threshold: Option<i64>,
    pub activation_lag_threshold: Option<i64>,
    pub allow_idle_consumers: Option<bool>,
    pub limit_to_partitions_with_lag: Option<bool>,
    pub ensure_even_distribution_of_partitions: Option<bool>,
    pub exclude_persistent_lag: Option<bool>,
    pub scale_to_zero_on_invalid_offset: Option<bool>,
    pub offset_reset_policy: Option<OffsetResetPolicy>,
    pub partition_limitation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceTrigger {
    pub trigger_index: Option<usize>,
    pub hub: Option<String>,
    pub consumer_group: Option<String>,
    pub unprocessed_event_threshold: Option<i64>,
    pub activation_unprocessed_event_threshold: Option<i64>,
    pub stale_partition_info_threshold: Option<i64>,
}

/// Login material handed to the offset source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Validated consumer-group trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerGroupSettings {
    pub trigger_index: usize,
    pub stream: String,
    pub topic: String,
    pub consumer_group: String,
    pub credentials: Option<Credentials>,
    pub policy: LagPolicy,
    pub activation_lag_threshold: i64,
    pub exclude_persistent_lag: bool,
    pub scale_to_zero_on_invalid_offset: bool,
    pub offset_reset_policy: OffsetResetPolicy,
    /// Partitions to consider. Empty means all.
    pub partition_limitation: Vec<PartitionId>,
}

/// Validated sequence-number trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSettings {
    pub trigger_index: usize,
    pub hub: String,
    pub consumer_group: String,
    pub unprocessed_event_threshold: i64,
    pub activation_unprocessed_event_threshold: i64,
    pub stale_partition_info_threshold: u64,
}

impl ScalerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn polling_interval(&self) -> ConfigResult<Duration> {
        match &self.polling_interval {
            Some(s) => parse_polling_interval(s),
            None => Ok(DEFAULT_POLLING_INTERVAL),
        }
    }
}

impl ConsumerGroupTrigger {
    pub fn validate(&self) -> ConfigResult<ConsumerGroupSettings> {
        let stream = required("stream", &self.stream)?;
        let topic = required("topic", &self.topic)?;
        let consumer_group = required("consumer_group", &self.consumer_group)?;

        let lag_threshold = self.lag_threshold.unwrap_or(DEFAULT_LAG_THRESHOLD);
        positive("lag_threshold", lag_threshold)?;
        let activation_lag_threshold = self.activation_lag_threshold.unwrap_or(0);
        non_negative("activation_lag_threshold", activation_lag_threshold)?;

        let allow_idle = self.allow_idle_consumers.unwrap_or(false);
        let limit = self.limit_to_partitions_with_lag.unwrap_or(false);
        let even = self.ensure_even_distribution_of_partitions.unwrap_or(false);
        if allow_idle && limit {
            return Err(ConfigError::Conflict(
                "allow_idle_consumers",
                "limit_to_partitions_with_lag",
            ));
        }
        if even && limit {
            return Err(ConfigError::Conflict(
                "ensure_even_distribution_of_partitions",
                "limit_to_partitions_with_lag",
            ));
        }

        let credentials = match (&self.username, &self.password) {
            (None, None) => None,
            (Some(u), _) if u.is_empty() => return Err(ConfigError::Missing("username")),
            (None, Some(_)) => return Err(ConfigError::Missing("username")),
            (Some(_), None) => return Err(ConfigError::Missing("password")),
            (Some(u), Some(p)) => Some(Credentials {
                username: u.clone(),
                password: p.clone(),
            }),
        };

        let partition_limitation = match &self.partition_limitation {
            Some(s) => parse_partition_list(s)?,
            None => Vec::new(),
        };

        Ok(ConsumerGroupSettings {
            trigger_index: self.trigger_index.unwrap_or(0),
            stream,
            topic,
            consumer_group,
            credentials,
            policy: LagPolicy::new(lag_threshold, allow_idle, limit, even),
            activation_lag_threshold,
            exclude_persistent_lag: self.exclude_persistent_lag.unwrap_or(false),
            scale_to_zero_on_invalid_offset: self
                .scale_to_zero_on_invalid_offset
                .unwrap_or(false),
            offset_reset_policy: self.offset_reset_policy.unwrap_or_default(),
            partition_limitation,
        })
    }
}

impl SequenceTrigger {
    pub fn validate(&self) -> ConfigResult<SequenceSettings> {
        let hub = required("hub", &self.hub)?;
        let consumer_group = required("consumer_group", &self.consumer_group)?;

        let threshold = self
            .unprocessed_event_threshold
            .unwrap_or(DEFAULT_UNPROCESSED_EVENT_THRESHOLD);
        positive("unprocessed_event_threshold", threshold)?;
        let activation = self.activation_unprocessed_event_threshold.unwrap_or(0);
        non_negative("activation_unprocessed_event_threshold", activation)?;

        let stale = match self.stale_partition_info_threshold {
            Some(v) => {
                non_negative("stale_partition_info_threshold", v)?;
                v as u64
            }
            None => DEFAULT_STALE_PARTITION_INFO_THRESHOLD,
        };

        Ok(SequenceSettings {
            trigger_index: self.trigger_index.unwrap_or(0),
            hub,
            consumer_group,
            unprocessed_event_threshold: threshold,
            activation_unprocessed_event_threshold: activation,
            stale_partition_info_threshold: stale,
        })
    }
}

fn required(field: &'static str, value: &Option<String>) -> ConfigResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(field)),
    }
}

fn positive(field: &'static str, value: i64) -> ConfigResult<()> {
    if value <= 0 {
        return Err(ConfigError::OutOfRange {
            field,
            expected: "greater than 0",
            value,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: i64) -> ConfigResult<()> {
    if value < 0 {
        return Err(ConfigError::OutOfRange {
            field,
            expected: "0 or greater",
            value,
        });
    }
    Ok(())
}

/// Parse a partition list like `"0, 2, 5-8"`. Ranges are inclusive;
/// duplicates are dropped while keeping first-seen order.
pub fn parse_partition_list(s: &str) -> ConfigResult<Vec<PartitionId>> {
    let invalid = |reason: String| ConfigError::Invalid {
        field: "partition_limitation",
        reason,
    };

    let mut out: Vec<PartitionId> = Vec::new();
    let mut seen: HashSet<PartitionId> = HashSet::new();
    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let (start, end) = match item.split_once('-') {
            Some((a, b)) => {
                let a = a.trim().parse::<PartitionId>().map_err(|e| invalid(format!("{item}: {e}")))?;
                let b = b.trim().parse::<PartitionId>().map_err(|e| invalid(format!("{item}: {e}")))?;
                if a > b {
                    return Err(invalid(format!("{item}: range start is after end")));
                }
                (a, b)
            }
            None => {
                let v = item.parse::<PartitionId>().map_err(|e| invalid(format!("{item}: {e}")))?;
                (v, v)
            }
        };
        let width = u64::from(end - start) + 1;
        if width > MAX_PARTITION_LIMITATION as u64 {
            return Err(invalid(format!(
                "{item}: range covers {width} partitions, at most {MAX_PARTITION_LIMITATION} allowed"
            )));
        }
        for id in start..=end {
            if seen.insert(id) {
                out.push(id);
            }
        }
        if out.len() > MAX_PARTITION_LIMITATION {
            return Err(invalid(format!(
                "more than {MAX_PARTITION_LIMITATION} partitions listed"
            )));
        }
    }
    Ok(out)
}

/// Parse a polling interval. Same syntax as [`parse_duration`], but zero
/// is rejected.
pub fn parse_polling_interval(s: &str) -> ConfigResult<Duration> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        return Err(ConfigError::Invalid {
            field: "polling_interval",
            reason: format!("{:?} must be greater than zero", s.trim()),
        });
    }
    Ok(interval)
}

/// Parse a duration string like "30s", "5m", or bare seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::Invalid {
        field: "duration",
        reason: format!("{s:?} is not a duration"),
    };
    let secs = if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid());
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map_err(|_| invalid())?
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().map_err(|_| invalid())?.saturating_mul(60)
    } else {
        s.parse::<u64>().map_err(|_| invalid())?
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{CappingStrategy, UpperBound};

    fn consumer_group() -> ConsumerGroupTrigger {
        ConsumerGroupTrigger {
            stream: Some("orders".to_string()),
            topic: Some("payments".to_string()),
            consumer_group: Some("billing".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_consumer_group_file() {
        let toml_str = r#"
polling_interval = "15s"

[trigger]
type = "consumer_group"
stream = "orders"
topic = "payments"
consumer_group = "billing"
lag_threshold = 50
limit_to_partitions_with_lag = true
offset_reset_policy = "earliest"
partition_limitation = "0,2-4"
"#;
        let config = ScalerConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.polling_interval().unwrap(), Duration::from_secs(15));

        let TriggerConfig::ConsumerGroup(trigger) = config.trigger else {
            panic!("expected consumer_group trigger");
        };
        let settings = trigger.validate().unwrap();
        assert_eq!(settings.policy.lag_threshold, 50);
        assert_eq!(
            settings.policy.strategy,
            CappingStrategy::Capped {
                balance: false,
                bound: UpperBound::PartitionsWithLag
            }
        );
        assert_eq!(settings.offset_reset_policy, OffsetResetPolicy::Earliest);
        assert_eq!(settings.partition_limitation, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_parse_sequence_file() {
        let toml_str = r#"
[trigger]
type = "sequence"
hub = "telemetry"
consumer_group = "$Default"
"#;
        let config = ScalerConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.polling_interval().unwrap(), DEFAULT_POLLING_INTERVAL);
        let TriggerConfig::Sequence(trigger) = config.trigger else {
            panic!("expected sequence trigger");
        };
        let settings = trigger.validate().unwrap();
        assert_eq!(settings.unprocessed_event_threshold, 64);
        assert_eq!(settings.activation_unprocessed_event_threshold, 0);
        assert_eq!(settings.stale_partition_info_threshold, 10_000);
    }

    #[test]
    fn test_unknown_trigger_type_fails() {
        let err = ScalerConfig::from_toml("[trigger]\ntype = \"cpu\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_defaults() {
        let settings = consumer_group().validate().unwrap();
        assert_eq!(settings.policy.lag_threshold, DEFAULT_LAG_THRESHOLD);
        assert_eq!(settings.activation_lag_threshold, 0);
        assert_eq!(settings.offset_reset_policy, OffsetResetPolicy::Latest);
        assert!(settings.partition_limitation.is_empty());
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn test_non_positive_lag_threshold_rejected() {
        for bad in [0, -1] {
            let mut t = consumer_group();
            t.lag_threshold = Some(bad);
            assert!(matches!(
                t.validate(),
                Err(ConfigError::OutOfRange { field: "lag_threshold", .. })
            ));
        }
    }

    #[test]
    fn test_negative_activation_rejected() {
        let mut t = consumer_group();
        t.activation_lag_threshold = Some(-1);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let mut t = consumer_group();
        t.allow_idle_consumers = Some(true);
        t.limit_to_partitions_with_lag = Some(true);
        assert_eq!(
            t.validate().unwrap_err(),
            ConfigError::Conflict("allow_idle_consumers", "limit_to_partitions_with_lag")
        );

        let mut t = consumer_group();
        t.ensure_even_distribution_of_partitions = Some(true);
        t.limit_to_partitions_with_lag = Some(true);
        assert!(matches!(t.validate(), Err(ConfigError::Conflict(..))));
    }

    #[test]
    fn test_missing_identifiers_rejected() {
        let mut t = consumer_group();
        t.topic = None;
        assert_eq!(t.validate().unwrap_err(), ConfigError::Missing("topic"));

        let mut t = consumer_group();
        t.consumer_group = Some("  ".to_string());
        assert_eq!(t.validate().unwrap_err(), ConfigError::Missing("consumer_group"));

        let t = SequenceTrigger::default();
        assert_eq!(t.validate().unwrap_err(), ConfigError::Missing("hub"));
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let mut t = consumer_group();
        t.username = Some("iggy".to_string());
        assert_eq!(t.validate().unwrap_err(), ConfigError::Missing("password"));

        t.password = Some("secret".to_string());
        let creds = t.validate().unwrap().credentials.unwrap();
        assert_eq!(creds.username, "iggy");
    }

    #[test]
    fn test_partition_list() {
        assert_eq!(parse_partition_list("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_partition_list("5-7,1,6").unwrap(), vec![5, 6, 7, 1]);
        assert_eq!(parse_partition_list("").unwrap(), Vec::<PartitionId>::new());
        assert!(parse_partition_list("a").is_err());
        assert!(parse_partition_list("7-5").is_err());
        assert!(parse_partition_list("-1").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("12").unwrap(), Duration::from_secs(12));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_partition_list_rejects_oversized_ranges() {
        assert!(matches!(
            parse_partition_list("0-4294967295"),
            Err(ConfigError::Invalid { field: "partition_limitation", .. })
        ));
        assert!(parse_partition_list("0-65536").is_err());
        assert_eq!(parse_partition_list("0-65535").unwrap().len(), MAX_PARTITION_LIMITATION);
        // Each range fits, the union does not.
        assert!(parse_partition_list("0-65535,70000").is_err());
        // Overlap does not count twice.
        assert_eq!(parse_partition_list("0-65535,0-10").unwrap().len(), MAX_PARTITION_LIMITATION);
    }

    #[test]
    fn test_zero_polling_interval_rejected() {
        assert!(parse_polling_interval("0s").is_err());
        assert!(parse_polling_interval("0ms").is_err());
        assert!(parse_polling_interval("0").is_err());
        assert_eq!(parse_polling_interval("1s").unwrap(), Duration::from_secs(1));

        let config = ScalerConfig {
            polling_interval: Some("0s".to_string()),
            trigger: TriggerConfig::ConsumerGroup(consumer_group()),
        };
        assert!(matches!(
            config.polling_interval(),
            Err(ConfigError::Invalid { field: "polling_interval", .. })
        ));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ScalerConfig {
            polling_interval: Some("10s".to_string()),
            trigger: TriggerConfig::ConsumerGroup(consumer_group()),
        };
        let s = config.to_toml_string().unwrap();
        assert!(s.contains("consumer_group"));
        assert!(ScalerConfig::from_toml(&s).is_ok());
    }
}
