pub mod evaluate;
pub mod watch;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lagscale_core::{ScalerConfig, TriggerConfig};
use lagscale_scaler::{
    ConsumerGroupScaler, Scaler, SequenceScaler, SnapshotSource, TtlSessionCache,
};

/// Build the scaler described by `config_path`, backed by the snapshot at
/// `snapshot_path`. Returns the scaler and the configured polling interval.
pub fn build_scaler(
    config_path: &str,
    snapshot_path: &str,
) -> anyhow::Result<(Box<dyn Scaler>, Duration)> {
    let config = ScalerConfig::from_file(Path::new(config_path))
        .with_context(|| format!("loading {config_path}"))?;
    let interval = config.polling_interval()?;
    let source = Arc::new(SnapshotSource::new(snapshot_path));

    let scaler: Box<dyn Scaler> = match &config.trigger {
        TriggerConfig::ConsumerGroup(trigger) => Box::new(ConsumerGroupScaler::from_trigger(
            trigger,
            source,
            Arc::new(TtlSessionCache::default()),
        )?),
        TriggerConfig::Sequence(trigger) => Box::new(SequenceScaler::from_trigger(
            trigger,
            source.clone(),
            source,
        )?),
    };

    Ok((scaler, interval))
}
