//! Rewrite orchestrator
//!
//! Deterministic except for the injected `Rewriter.generate` call: trigger
//! evaluation, canonical prompt filling, trend classification, and
//! loop-breaking are all rule-based. Every decision that depends on approval
//! state is re-checked inside the executing task immediately before side
//! effects, and every refusal is recorded as a terminal cycle row so the
//! audit trail shows why no child version appeared.

pub mod cycles;
pub mod prompt;
pub mod rewriter;
pub mod trend;
pub mod triggers;

use crate::pipeline::{regression, EvaluationPipeline};
use crate::runner::{TaskDescriptor, TaskHandle, WorkflowRunner};
use crate::store::{versions::AppendVersion, ContentStore};
use cqe_common::config::EngineConfig;
use cqe_common::db::models::{RewriteCycle, RewriteStatus, VersionSource};
use cqe_common::events::{EngineEvent, EventBus};
use cqe_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub use rewriter::{Rewriter, StaticRewriter};
pub use trend::StopRule;
pub use triggers::RewriteTrigger;

/// Outcome of one orchestration request
#[derive(Debug, Clone)]
pub enum RewriteOutcome {
    /// No trigger fired (or none was evaluable); nothing was done.
    NoRewriteRequired {
        /// False when metrics were missing and the rules could not be
        /// evaluated at all
        evaluable: bool,
    },
    /// A loop-breaking rule refused the cycle; a terminal row records why.
    Stopped(RewriteCycle),
    /// A child version was appended and evaluated.
    Completed(RewriteCycle),
}

/// The rewrite orchestrator service
#[derive(Clone)]
pub struct RewriteOrchestrator {
    pool: SqlitePool,
    store: ContentStore,
    pipeline: EvaluationPipeline,
    rewriter: Arc<dyn Rewriter>,
    runner: Arc<WorkflowRunner>,
    config: EngineConfig,
    events: EventBus,
}

impl RewriteOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        store: ContentStore,
        pipeline: EvaluationPipeline,
        rewriter: Arc<dyn Rewriter>,
        runner: Arc<WorkflowRunner>,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            store,
            pipeline,
            rewriter,
            runner,
            config,
            events,
        }
    }

    /// Queue a rewrite through the workflow runner. Rewrites are not
    /// idempotent, so the task retries at most once, and only on
    /// timeout/unavailable failures.
    pub fn spawn(&self, version_id: Uuid, actor: Option<Uuid>) -> TaskHandle {
        let orchestrator = self.clone();
        let timeout = Duration::from_secs(self.config.rewriter_timeout_seconds + 60);
        self.runner.submit(
            TaskDescriptor::new(format!("rewrite:{version_id}"), 1, timeout),
            move || {
                let orchestrator = orchestrator.clone();
                async move {
                    orchestrator.orchestrate_rewrite(version_id, actor).await?;
                    Ok(())
                }
            },
        )
    }

    /// Execute one bounded rewrite cycle for a parent version.
    ///
    /// This is the worker body: the approval and cap checks run here, inside
    /// the task, not at queue time.
    pub async fn orchestrate_rewrite(
        &self,
        version_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<RewriteOutcome> {
        let parent = self.store.get_version(version_id).await?;

        // 1. Latest finished scores for the parent decide the triggers.
        let run = crate::pipeline::runs::latest_completed_run_for_version(&self.pool, version_id)
            .await?
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "version {version_id} has no finished evaluation to act on"
                ))
            })?;
        let report = self.pipeline.get_evaluation(run.id).await?;
        let ctx = triggers::build_trigger_context(&report);
        let fired = triggers::evaluate_triggers(&ctx);

        // 2. Nothing fired: log the decision and stop.
        if fired.is_empty() {
            if ctx.is_empty() {
                warn!(
                    version_id = %version_id,
                    run_id = %run.id,
                    "Trigger inputs missing, rules not evaluable, refusing to rewrite"
                );
                return Ok(RewriteOutcome::NoRewriteRequired { evaluable: false });
            }
            info!(version_id = %version_id, run_id = %run.id, decision = "no_rewrite_required", "No rewrite trigger fired");
            return Ok(RewriteOutcome::NoRewriteRequired { evaluable: true });
        }

        let filled_prompt = prompt::build_prompt(&parent.content, &fired);
        let trigger_reasons: Vec<String> = fired.iter().map(|t| t.reason()).collect();
        let trigger_data = serde_json::json!({
            "triggers": fired,
            "source_run_id": run.id,
        });

        let new_cycle = |status: RewriteStatus, stop_reason: Option<String>, number: i64| {
            cycles::NewCycle {
                parent_version_id: version_id,
                cycle_number: number,
                trigger_reasons: trigger_reasons.clone(),
                trigger_data: trigger_data.clone(),
                rewrite_prompt: filled_prompt.clone(),
                parent_aeo_total: ctx.aeo_total,
                parent_ai_likeness_total: ctx.ai_likeness_total,
                status,
                stop_reason,
            }
        };

        let next_number = cycles::next_cycle_number(&self.pool, version_id).await?;

        // 3. TOCTOU re-check: the blog may have been approved while queued.
        if self.store.current_approval(parent.blog_id).await?.is_some() {
            let cycle = cycles::insert_cycle(
                &self.pool,
                new_cycle(
                    RewriteStatus::Terminal,
                    Some("approved_content".to_string()),
                    next_number,
                ),
            )
            .await?;
            self.emit_finished(&cycle);
            return Err(Error::ApprovedContent(format!(
                "blog {} was approved while the rewrite was queued",
                parent.blog_id
            )));
        }

        // 4. Per-blog cap re-check, defense against direct task invocation.
        let blog_cycles = cycles::count_cycles_for_blog(&self.pool, parent.blog_id).await?;
        if blog_cycles >= self.config.max_rewrite_cycles {
            let cycle = cycles::insert_cycle(
                &self.pool,
                new_cycle(
                    RewriteStatus::Terminal,
                    Some("cap_exceeded".to_string()),
                    next_number,
                ),
            )
            .await?;
            self.emit_finished(&cycle);
            return Err(Error::CapExceeded(format!(
                "blog {} already has {blog_cycles} rewrite cycles (cap {})",
                parent.blog_id, self.config.max_rewrite_cycles
            )));
        }

        // Loop-breaking, evaluated before producing the next cycle.
        let history = cycles::list_cycles_for_blog(&self.pool, parent.blog_id).await?;
        if let Some(rule) = trend::check_stop_rules(next_number, &history) {
            let cycle = cycles::insert_cycle(
                &self.pool,
                new_cycle(
                    RewriteStatus::Terminal,
                    Some(rule.stop_reason().to_string()),
                    next_number,
                ),
            )
            .await?;
            self.emit_finished(&cycle);
            if rule == StopRule::MaxCyclesReached {
                return Err(Error::CapExceeded(format!(
                    "parent version {version_id} reached its rewrite cycle limit"
                )));
            }
            info!(
                version_id = %version_id,
                stop_reason = rule.stop_reason(),
                "Rewrite loop stopped"
            );
            return Ok(RewriteOutcome::Stopped(cycle));
        }

        // 5. One pending cycle per parent; losing the insert race is a
        // conflict the caller may retry.
        let cycle =
            cycles::insert_cycle(&self.pool, new_cycle(RewriteStatus::Pending, None, next_number))
                .await?;

        info!(
            cycle_id = %cycle.id,
            version_id = %version_id,
            cycle_number = next_number,
            triggers = ?trigger_reasons,
            "Rewrite cycle started"
        );

        // 6. External call with explicit deadline.
        let deadline = Duration::from_secs(self.config.rewriter_timeout_seconds);
        let generated =
            match tokio::time::timeout(deadline, self.rewriter.generate(&filled_prompt)).await {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    let cycle =
                        cycles::terminate_cycle(&self.pool, cycle.id, "rewriter_error", None)
                            .await?;
                    self.emit_finished(&cycle);
                    return Err(Error::Unavailable(format!("rewriter failed: {e}")));
                }
                Err(_) => {
                    let cycle =
                        cycles::terminate_cycle(&self.pool, cycle.id, "timeout", None).await?;
                    self.emit_finished(&cycle);
                    return Err(Error::Timeout(format!(
                        "rewriter exceeded {deadline:?} deadline"
                    )));
                }
            };

        // 7. Append the child version through the content store.
        let created_by = actor.unwrap_or_else(cqe_common::db::init::system_actor_id);
        let child = match self
            .store
            .append_version(AppendVersion {
                blog_id: parent.blog_id,
                content: &generated,
                source: VersionSource::AiRewrite,
                parent_version_id: Some(parent.id),
                change_reason: Some("automated rewrite"),
                source_rewrite_cycle_id: Some(cycle.id),
                created_by,
            })
            .await
        {
            Ok(child) => child,
            Err(e) => {
                let cycle =
                    cycles::terminate_cycle(&self.pool, cycle.id, "version_append_failed", None)
                        .await?;
                self.emit_finished(&cycle);
                return Err(e);
            }
        };

        // 8. Evaluate the child and wait for the fan-in.
        let child_run = self.pipeline.evaluate_and_wait(child.id, None).await?;
        let child_metrics = regression::collect_metrics(&self.pool, child_run.id).await?;

        // 9. Close the cycle: link the child, snapshot scores, classify trend.
        if child_metrics.aeo_total.is_none() && child_metrics.detector_mean.is_none() {
            let cycle = cycles::terminate_cycle(
                &self.pool,
                cycle.id,
                "child_evaluation_failed",
                Some(child.id),
            )
            .await?;
            self.emit_finished(&cycle);
            return Ok(RewriteOutcome::Stopped(cycle));
        }

        let outcome = trend::classify_trend(
            ctx.aeo_total,
            ctx.ai_likeness_total,
            child_metrics.aeo_total,
            child_metrics.detector_mean,
        );
        let cycle = cycles::complete_cycle(
            &self.pool,
            cycle.id,
            child.id,
            child_metrics.aeo_total,
            child_metrics.detector_mean,
            outcome,
        )
        .await?;

        info!(
            cycle_id = %cycle.id,
            child_version_id = %child.id,
            trend = ?cycle.trend_outcome,
            "Rewrite cycle completed"
        );
        self.emit_finished(&cycle);

        Ok(RewriteOutcome::Completed(cycle))
    }

    fn emit_finished(&self, cycle: &RewriteCycle) {
        self.events.emit(EngineEvent::RewriteCycleFinished {
            cycle_id: cycle.id,
            parent_version_id: cycle.parent_version_id,
            status: cycle.rewrite_status.as_str().to_string(),
            stop_reason: cycle.stop_reason.clone(),
            timestamp: cqe_common::time::now(),
        });
    }
}
