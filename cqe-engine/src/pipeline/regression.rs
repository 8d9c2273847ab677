//! Score-regression detection
//!
//! After a run finalizes, its aggregates are compared against the most
//! recent finished run for the same blog. A metric is only comparable when
//! the model versions behind it match; otherwise it is skipped with a
//! warning. A regression on an unapproved blog opens a `score_regression`
//! escalation; an approved blog is left alone (human override governs).

use super::runs;
use crate::store::ContentStore;
use cqe_common::db::models::{EscalationReason, EvaluationRun};
use cqe_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Points a metric must move (in the bad direction) to count as a regression
const REGRESSION_THRESHOLD: f64 = 10.0;

/// Aggregated metrics of one run
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Mean over all detector scores (higher = more AI-like)
    pub detector_mean: Option<f64>,
    /// provider -> model_version, for comparability checks
    pub detector_versions: BTreeMap<String, String>,
    /// AEO total of the general query intent (higher = better)
    pub aeo_total: Option<f64>,
    pub aeo_version: Option<String>,
}

pub async fn collect_metrics(pool: &SqlitePool, run_id: Uuid) -> Result<RunMetrics> {
    let detectors = runs::list_detector_scores(pool, run_id).await?;
    let aeo = runs::list_aeo_scores(pool, run_id).await?;

    let mut metrics = RunMetrics::default();

    if !detectors.is_empty() {
        let sum: f64 = detectors.iter().map(|d| d.score).sum();
        metrics.detector_mean = Some(sum / detectors.len() as f64);
        for d in &detectors {
            if let Some(version) = d.details.get("model_version").and_then(|v| v.as_str()) {
                metrics.detector_versions.insert(d.provider.clone(), version.to_string());
            }
        }
    }

    if let Some(row) = aeo.first() {
        metrics.aeo_total = Some(row.score);
        metrics.aeo_version = row
            .details
            .get("rubric_version")
            .and_then(|v| v.as_str())
            .map(str::to_string);
    }

    Ok(metrics)
}

/// Compare this run against the previous finished run and escalate on
/// regression. No-op when there is no prior run or the blog is approved.
pub async fn detect_regression(
    pool: &SqlitePool,
    store: &ContentStore,
    run: &EvaluationRun,
) -> Result<()> {
    let version = store.get_version(run.blog_version_id).await?;

    let Some(previous) = runs::latest_finished_run_before(pool, version.blog_id, run).await? else {
        return Ok(());
    };

    let current = collect_metrics(pool, run.id).await?;
    let prior = collect_metrics(pool, previous.id).await?;

    let mut regressions: Vec<serde_json::Value> = Vec::new();

    // AEO: lower is worse.
    match (prior.aeo_total, current.aeo_total) {
        (Some(prev), Some(now)) => {
            if prior.aeo_version == current.aeo_version {
                if prev - now > REGRESSION_THRESHOLD {
                    regressions.push(serde_json::json!({
                        "metric": "aeo_total",
                        "previous": prev,
                        "current": now,
                    }));
                }
            } else {
                warn!(
                    run_id = %run.id,
                    previous_run_id = %previous.id,
                    "AEO rubric versions differ between runs, skipping metric"
                );
            }
        }
        _ => {}
    }

    // AI-likeness: higher is worse.
    match (prior.detector_mean, current.detector_mean) {
        (Some(prev), Some(now)) => {
            if prior.detector_versions == current.detector_versions {
                if now - prev > REGRESSION_THRESHOLD {
                    regressions.push(serde_json::json!({
                        "metric": "ai_likeness_mean",
                        "previous": prev,
                        "current": now,
                    }));
                }
            } else {
                warn!(
                    run_id = %run.id,
                    previous_run_id = %previous.id,
                    "Detector model versions differ between runs, skipping metric"
                );
            }
        }
        _ => {}
    }

    if regressions.is_empty() {
        return Ok(());
    }

    if store.current_approval(version.blog_id).await?.is_some() {
        info!(
            blog_id = %version.blog_id,
            run_id = %run.id,
            "Score regression on approved blog, human override governs"
        );
        return Ok(());
    }

    store
        .open_escalation(
            version.blog_id,
            version.id,
            EscalationReason::ScoreRegression,
            Some(serde_json::json!({
                "run_id": run.id,
                "previous_run_id": previous.id,
                "regressions": regressions,
            })),
        )
        .await?;

    Ok(())
}
