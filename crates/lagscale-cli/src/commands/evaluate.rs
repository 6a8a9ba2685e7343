//! `lagscale evaluate` — one poll against a snapshot file.

use serde::Serialize;

use lagscale_core::{MetricSpec, MetricValue};

use super::build_scaler;

#[derive(Debug, Serialize)]
pub struct Evaluation {
    pub spec: Vec<MetricSpec>,
    pub metrics: Vec<MetricValue>,
    pub is_active: bool,
}

pub async fn evaluate(config: &str, snapshot: &str, format: &str) -> anyhow::Result<()> {
    let (mut scaler, _) = build_scaler(config, snapshot)?;
    let spec = scaler.metric_spec_for_scaling();
    let metric_name = spec
        .first()
        .map(|s| s.metric_name.clone())
        .unwrap_or_default();

    let result = scaler.metrics_and_activity(&metric_name).await;
    scaler.close().await?;
    let (metrics, is_active) = result?;

    let evaluation = Evaluation {
        spec,
        metrics,
        is_active,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&evaluation)?),
        _ => print!("{}", format_evaluation(&evaluation)),
    }

    Ok(())
}

pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    for spec in &evaluation.spec {
        out.push_str(&format!(
            "metric   {}  (target {:.3} per replica)\n",
            spec.metric_name,
            spec.target_milli as f64 / 1000.0
        ));
    }
    for m in &evaluation.metrics {
        out.push_str(&format!("value    {:.3}  ({}m)\n", m.value(), m.milli_value));
    }
    out.push_str(&format!(
        "active   {}\n",
        if evaluation.is_active { "yes" } else { "no" }
    ));
    out
}
