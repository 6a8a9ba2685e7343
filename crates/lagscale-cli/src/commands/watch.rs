//! `lagscale watch` — poll a scaler on an interval until Ctrl-C.

use tracing::info;

use lagscale_core::config::parse_polling_interval;
use lagscale_scaler::{PollOutcome, Poller};

use super::build_scaler;

pub async fn watch(config: &str, snapshot: &str, interval: Option<&str>) -> anyhow::Result<()> {
    let (scaler, configured) = build_scaler(config, snapshot)?;
    let interval = match interval {
        Some(s) => parse_polling_interval(s)?,
        None => configured,
    };

    let poller = Poller::new(scaler, interval).with_callback(Box::new(|outcome| {
        println!("{}", format_outcome(outcome));
    }));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(poller.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}

pub fn format_outcome(outcome: &PollOutcome) -> String {
    let values = outcome
        .metrics
        .iter()
        .map(|m| format!("{}m", m.milli_value))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{} value={} active={}",
        outcome.metric_name, values, outcome.is_active
    )
}
