//! Evaluation pipeline
//!
//! Creates one EvaluationRun per request, fans out to the configured
//! scorers through the workflow runner, aggregates partial failures, and
//! finalizes the run exactly once. Scorer tasks are idempotent
//! (check-then-insert), so at-least-once execution never double-writes.

pub mod regression;
pub mod runs;

use crate::registry::ScorerRegistry;
use crate::runner::{TaskDescriptor, WorkflowRunner};
use crate::scoring::{Scorer, ScorerOutput};
use crate::store::ContentStore;
use cqe_common::config::EngineConfig;
use cqe_common::db::models::{AeoScore, DetectorScore, EvaluationRun, RunStatus};
use cqe_common::events::{EngineEvent, EventBus};
use cqe_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Deadline per scorer task. The built-in scorers are deterministic and
/// fast; this bound exists for any LLM-backed scorer a deployment registers.
const SCORER_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Retries for scorer tasks (they are idempotent)
const SCORER_TASK_RETRIES: u32 = 3;

/// Deadline for a whole run execution
const RUN_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// A run together with its attached score rows
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub run: EvaluationRun,
    pub detector_scores: Vec<DetectorScore>,
    pub aeo_scores: Vec<AeoScore>,
}

/// The evaluation pipeline service
#[derive(Clone)]
pub struct EvaluationPipeline {
    pool: SqlitePool,
    store: ContentStore,
    registry: Arc<ScorerRegistry>,
    runner: Arc<WorkflowRunner>,
    config: EngineConfig,
    events: EventBus,
}

impl EvaluationPipeline {
    pub fn new(
        pool: SqlitePool,
        store: ContentStore,
        registry: Arc<ScorerRegistry>,
        runner: Arc<WorkflowRunner>,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            store,
            registry,
            runner,
            config,
            events,
        }
    }

    /// Start an evaluation of a version.
    ///
    /// Refuses (`approved_content`) when the blog's current approval points
    /// at this exact version. If a run for the version is still processing,
    /// that run is returned instead of creating a new one. The run executes
    /// in the background; use [`get_evaluation`](Self::get_evaluation) to
    /// read results back.
    pub async fn start_evaluation(
        &self,
        version_id: Uuid,
        triggered_by: Option<Uuid>,
    ) -> Result<EvaluationRun> {
        let version = self.store.get_version(version_id).await?;

        if let Some(approval) = self.store.current_approval(version.blog_id).await? {
            if approval.approved_version_id == version_id {
                return Err(Error::ApprovedContent(format!(
                    "version {version_id} is the blog's approved version and is not re-evaluated"
                )));
            }
        }

        if let Some(existing) = runs::find_processing_run(&self.pool, version_id).await? {
            info!(
                run_id = %existing.id,
                version_id = %version_id,
                "Evaluation already processing, returning existing run"
            );
            self.spawn_run(existing.id);
            return Ok(existing);
        }

        let model_config = serde_json::json!({
            "enabled_detectors": self.config.enabled_detectors,
        });
        let run = runs::create_run(&self.pool, version_id, triggered_by, model_config).await?;

        info!(run_id = %run.id, version_id = %version_id, "Evaluation run created");
        self.events.emit(EngineEvent::EvaluationStarted {
            run_id: run.id,
            version_id,
            timestamp: run.run_at,
        });

        self.spawn_run(run.id);
        Ok(run)
    }

    /// Start an evaluation and wait for it to finalize. Used by the rewrite
    /// orchestrator, which needs the child scores before classifying trend.
    pub async fn evaluate_and_wait(
        &self,
        version_id: Uuid,
        triggered_by: Option<Uuid>,
    ) -> Result<EvaluationRun> {
        let run = self.start_evaluation(version_id, triggered_by).await?;
        let handle = self.spawn_run(run.id);
        handle.join().await.map_err(|f| f.into_error())?;
        runs::get_run(&self.pool, run.id).await
    }

    /// A run plus its attached scores.
    pub async fn get_evaluation(&self, run_id: Uuid) -> Result<EvaluationReport> {
        let run = runs::get_run(&self.pool, run_id).await?;
        let detector_scores = runs::list_detector_scores(&self.pool, run_id).await?;
        let aeo_scores = runs::list_aeo_scores(&self.pool, run_id).await?;
        Ok(EvaluationReport {
            run,
            detector_scores,
            aeo_scores,
        })
    }

    fn spawn_run(&self, run_id: Uuid) -> crate::runner::TaskHandle {
        let pipeline = self.clone();
        self.runner.submit(
            TaskDescriptor::new(format!("evaluation:{run_id}"), 0, RUN_TASK_TIMEOUT),
            move || {
                let pipeline = pipeline.clone();
                async move { pipeline.execute_run(run_id).await }
            },
        )
    }

    /// Execute a run: fan out scorer tasks, wait for the fan-in, finalize.
    /// Safe to re-execute; finished work is detected and skipped.
    async fn execute_run(&self, run_id: Uuid) -> Result<()> {
        let run = runs::get_run(&self.pool, run_id).await?;
        if run.status != RunStatus::Processing {
            return Ok(());
        }

        let version = self.store.get_version(run.blog_version_id).await?;
        let content = Arc::new(version.content.clone());

        // The frozen snapshot decides which scorers run, not live config.
        let enabled: Vec<String> = run
            .model_config
            .get("enabled_detectors")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::Internal(format!("malformed model_config snapshot: {e}")))?
            .unwrap_or_default();

        let scorers = self.registry.active(Some(&enabled))?;

        let mut handles = Vec::with_capacity(scorers.len());
        for scorer in scorers {
            let scorer: Arc<dyn Scorer> = Arc::from(scorer);
            let scorer_id = scorer.id();
            let pool = self.pool.clone();
            let content = Arc::clone(&content);
            let handle = self.runner.submit(
                TaskDescriptor::new(
                    format!("evaluation:{run_id}:scorer:{scorer_id}"),
                    SCORER_TASK_RETRIES,
                    SCORER_TASK_TIMEOUT,
                ),
                move || {
                    let scorer = Arc::clone(&scorer);
                    let pool = pool.clone();
                    let content = Arc::clone(&content);
                    async move { run_scorer_task(&pool, run_id, scorer.as_ref(), &content).await }
                },
            );
            handles.push((scorer_id.to_string(), handle));
        }

        // Fan-in: every scorer task reports success or failure.
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (scorer_id, handle) in handles {
            match handle.join().await {
                Ok(()) => succeeded += 1,
                Err(f) => {
                    failed += 1;
                    error!(
                        run_id = %run_id,
                        scorer_id = %scorer_id,
                        kind = %f.kind,
                        message = %f.message,
                        "Scorer task failed"
                    );
                }
            }
        }

        let status = if succeeded == 0 {
            RunStatus::Failed
        } else if failed == 0 {
            RunStatus::Completed
        } else {
            RunStatus::PartialFailure
        };

        let finalized = runs::finalize_run(&self.pool, run_id, status).await?;
        if !finalized {
            // Another execution already finalized this run.
            return Ok(());
        }

        info!(
            run_id = %run_id,
            status = status.as_str(),
            succeeded,
            failed,
            "Evaluation run finalized"
        );
        self.events.emit(EngineEvent::EvaluationFinalized {
            run_id,
            version_id: run.blog_version_id,
            status: status.as_str().to_string(),
            timestamp: cqe_common::time::now(),
        });

        if status != RunStatus::Failed {
            let run = runs::get_run(&self.pool, run_id).await?;
            regression::detect_regression(&self.pool, &self.store, &run).await?;
        }

        Ok(())
    }
}

/// One scorer task: score the content and persist the row unless it already
/// exists (check-then-insert idempotency).
async fn run_scorer_task(
    pool: &SqlitePool,
    run_id: Uuid,
    scorer: &dyn Scorer,
    content: &str,
) -> Result<()> {
    match scorer.score(content)? {
        ScorerOutput::Detector {
            provider,
            score,
            details,
        } => {
            let inserted =
                runs::insert_detector_score(pool, run_id, &provider, score, &details).await?;
            if !inserted {
                info!(run_id = %run_id, provider, "Detector score already present, skipping insert");
            }
        }
        ScorerOutput::Aeo {
            query_intent,
            score,
            rationale,
            details,
        } => {
            let inserted =
                runs::insert_aeo_score(pool, run_id, &query_intent, score, &rationale, &details)
                    .await?;
            if !inserted {
                info!(run_id = %run_id, query_intent, "AEO score already present, skipping insert");
            }
        }
    }
    Ok(())
}
