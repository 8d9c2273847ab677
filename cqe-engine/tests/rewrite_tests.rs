//! Rewrite orchestrator integration tests
//!
//! Trigger-driven cycles, verbatim prompt storage, TOCTOU approval guard,
//! cycle caps, loop-breaking, and rewriter failure handling.

mod helpers;

use async_trait::async_trait;
use cqe_common::db::models::{RewriteStatus, TrendOutcome, VersionSource};
use cqe_engine::rewrite::{cycles, Rewriter, RewriteOutcome};
use cqe_engine::store::versions::AppendVersion;
use cqe_engine::Error;
use helpers::{fast_config, strong_content, test_engine, weak_content, TestEngine};
use std::sync::Arc;
use uuid::Uuid;

async fn seed_weak_version(engine: &TestEngine, name: &str) -> (Uuid, Uuid) {
    let blog = engine
        .store
        .create_blog(name, engine.writer.id, None)
        .await
        .unwrap();
    let version = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: &weak_content(),
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    engine
        .pipeline
        .evaluate_and_wait(version.id, None)
        .await
        .unwrap();
    (blog.id, version.id)
}

#[tokio::test]
async fn rewrite_cycle_appends_and_evaluates_child() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, parent_id) = seed_weak_version(&engine, "rewrite me").await;
    let orchestrator = engine.orchestrator_with_output(&strong_content());

    let outcome = orchestrator
        .orchestrate_rewrite(parent_id, Some(engine.writer.id))
        .await
        .unwrap();
    let cycle = match outcome {
        RewriteOutcome::Completed(cycle) => cycle,
        other => panic!("expected completed cycle, got {other:?}"),
    };

    assert_eq!(cycle.rewrite_status, RewriteStatus::Completed);
    assert_eq!(cycle.cycle_number, 1);
    assert!(cycle.parent_aeo_total.is_some());
    assert!(cycle.child_aeo_total.is_some());
    assert!(cycle.trend_outcome.is_some());
    assert_eq!(cycle.trend_code, cycle.trend_outcome.map(|t| t.code()));

    // The child is a proper ai_rewrite version pointing back at the cycle.
    let child_id = cycle.child_version_id.expect("child appended");
    let child = engine.store.get_version(child_id).await.unwrap();
    assert_eq!(child.source, VersionSource::AiRewrite);
    assert_eq!(child.source_rewrite_cycle_id, Some(cycle.id));
    assert_eq!(child.parent_version_id, Some(parent_id));
    assert_eq!(child.blog_id, blog_id);

    // Child scores improved sharply, so the trend is favorable.
    assert!(matches!(
        cycle.trend_outcome,
        Some(TrendOutcome::Improving) | Some(TrendOutcome::PartialImprovement)
    ));
}

#[tokio::test]
async fn filled_prompt_is_stored_verbatim_before_the_call() {
    /// Rewriter that captures the prompt it was given
    struct CapturingRewriter {
        seen: std::sync::Mutex<Option<String>>,
        output: String,
    }

    #[async_trait]
    impl Rewriter for CapturingRewriter {
        async fn generate(&self, prompt: &str) -> cqe_common::Result<String> {
            *self.seen.lock().unwrap() = Some(prompt.to_string());
            Ok(self.output.clone())
        }
    }

    let engine = test_engine(fast_config()).await;
    let (_, parent_id) = seed_weak_version(&engine, "verbatim prompt").await;
    let rewriter = Arc::new(CapturingRewriter {
        seen: std::sync::Mutex::new(None),
        output: strong_content(),
    });
    let orchestrator = engine.orchestrator(rewriter.clone());

    let outcome = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap();
    let cycle = match outcome {
        RewriteOutcome::Completed(cycle) => cycle,
        other => panic!("expected completed cycle, got {other:?}"),
    };

    let sent = rewriter.seen.lock().unwrap().clone().unwrap();
    assert_eq!(cycle.rewrite_prompt, sent);
    assert!(sent.contains(&weak_content()));
    assert!(sent.contains("REQUIRED FIXES:"));
    assert!(sent.contains("STRICT PROHIBITIONS:"));
    assert!(!cycle.trigger_reasons.is_empty());
}

#[tokio::test]
async fn no_trigger_means_no_rewrite() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("already good", engine.writer.id, None)
        .await
        .unwrap();
    let version = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: &strong_content(),
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    engine.pipeline.evaluate_and_wait(version.id, None).await.unwrap();

    let orchestrator = engine.orchestrator_with_output("unused");
    let outcome = orchestrator.orchestrate_rewrite(version.id, None).await.unwrap();
    assert!(matches!(
        outcome,
        RewriteOutcome::NoRewriteRequired { evaluable: true }
    ));

    // No cycle row, no extra version.
    assert_eq!(engine.store.list_versions(blog.id).await.unwrap().len(), 1);
    assert!(cycles::list_cycles_for_blog(&engine.pool, blog.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn approval_while_queued_stops_the_worker() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, parent_id) = seed_weak_version(&engine, "toctou").await;

    // The blog gets approved between queuing and execution.
    engine
        .store
        .record_approval(blog_id, parent_id, engine.reviewer.id, None)
        .await
        .unwrap();

    let orchestrator = engine.orchestrator_with_output("unused");
    let err = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap_err();
    assert!(matches!(err, Error::ApprovedContent(_)));

    // The refusal is recorded: terminal cycle, no child version.
    let history = cycles::list_cycles_for_blog(&engine.pool, blog_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rewrite_status, RewriteStatus::Terminal);
    assert_eq!(history[0].stop_reason.as_deref(), Some("approved_content"));
    assert!(history[0].child_version_id.is_none());
    assert_eq!(engine.store.list_versions(blog_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn blog_cycle_cap_is_rechecked_in_the_worker() {
    let mut config = fast_config();
    config.max_rewrite_cycles = 1;
    let engine = test_engine(config).await;
    let (blog_id, parent_id) = seed_weak_version(&engine, "capped").await;
    let orchestrator = engine.orchestrator_with_output(&strong_content());

    // First cycle consumes the cap.
    orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap();

    let err = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap_err();
    assert!(matches!(err, Error::CapExceeded(_)));

    let history = cycles::list_cycles_for_blog(&engine.pool, blog_id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.rewrite_status, RewriteStatus::Terminal);
    assert_eq!(last.stop_reason.as_deref(), Some("cap_exceeded"));
}

#[tokio::test]
async fn per_parent_cycle_limit_stops_with_cap_exceeded() {
    let engine = test_engine(fast_config()).await;
    let (_, parent_id) = seed_weak_version(&engine, "parent limit").await;

    // Three cycles already recorded against this parent.
    for number in 1..=3 {
        cycles::insert_cycle(
            &engine.pool,
            cycles::NewCycle {
                parent_version_id: parent_id,
                cycle_number: number,
                trigger_reasons: vec!["aeo_total_low:aeo_total".to_string()],
                trigger_data: serde_json::json!({}),
                rewrite_prompt: "recorded".to_string(),
                parent_aeo_total: Some(40.0),
                parent_ai_likeness_total: Some(70.0),
                status: RewriteStatus::Terminal,
                stop_reason: Some("timeout".to_string()),
            },
        )
        .await
        .unwrap();
    }

    let orchestrator = engine.orchestrator_with_output("unused");
    let err = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap_err();
    assert!(matches!(err, Error::CapExceeded(_)));

    let version = engine.store.get_version(parent_id).await.unwrap();
    let history = cycles::list_cycles_for_blog(&engine.pool, version.blog_id)
        .await
        .unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.stop_reason.as_deref(), Some("max_cycles_reached"));
}

#[tokio::test]
async fn oscillating_child_totals_refuse_the_next_cycle() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, v1) = seed_weak_version(&engine, "oscillating").await;

    // Three finished rewrite generations whose child AEO totals span 1.7.
    let mut parent = v1;
    for (number, child_total) in [(1, 71.0_f64), (2, 72.5), (3, 70.8)].into_iter() {
        let cycle = cycles::insert_cycle(
            &engine.pool,
            cycles::NewCycle {
                parent_version_id: parent,
                cycle_number: 1,
                trigger_reasons: vec!["aeo_total_low:aeo_total".to_string()],
                trigger_data: serde_json::json!({}),
                rewrite_prompt: format!("generation {number}"),
                parent_aeo_total: Some(70.0),
                parent_ai_likeness_total: Some(50.0),
                status: RewriteStatus::Pending,
                stop_reason: None,
            },
        )
        .await
        .unwrap();
        let child = engine
            .store
            .append_version(AppendVersion {
                blog_id,
                content: &weak_content(),
                source: VersionSource::AiRewrite,
                parent_version_id: Some(parent),
                change_reason: None,
                source_rewrite_cycle_id: Some(cycle.id),
                created_by: engine.writer.id,
            })
            .await
            .unwrap();
        cycles::complete_cycle(
            &engine.pool,
            cycle.id,
            child.id,
            Some(child_total),
            Some(48.0),
            Some(TrendOutcome::PartialImprovement),
        )
        .await
        .unwrap();
        parent = child.id;
    }

    // The latest generation needs finished scores for trigger evaluation.
    engine.pipeline.evaluate_and_wait(parent, None).await.unwrap();

    let orchestrator = engine.orchestrator_with_output("unused");
    let outcome = orchestrator.orchestrate_rewrite(parent, None).await.unwrap();
    let cycle = match outcome {
        RewriteOutcome::Stopped(cycle) => cycle,
        other => panic!("expected stopped cycle, got {other:?}"),
    };
    assert_eq!(cycle.stop_reason.as_deref(), Some("oscillation_detected"));
    assert!(cycle.child_version_id.is_none());
}

#[tokio::test]
async fn rewriter_timeout_marks_cycle_terminal() {
    /// Rewriter that never returns in time
    struct SlowRewriter;

    #[async_trait]
    impl Rewriter for SlowRewriter {
        async fn generate(&self, _prompt: &str) -> cqe_common::Result<String> {
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            Ok(String::new())
        }
    }

    let mut config = fast_config();
    config.rewriter_timeout_seconds = 1;
    let engine = test_engine(config).await;
    let (blog_id, parent_id) = seed_weak_version(&engine, "slow rewriter").await;

    let orchestrator = engine.orchestrator(Arc::new(SlowRewriter));
    let err = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    let history = cycles::list_cycles_for_blog(&engine.pool, blog_id).await.unwrap();
    assert_eq!(history[0].rewrite_status, RewriteStatus::Terminal);
    assert_eq!(history[0].stop_reason.as_deref(), Some("timeout"));
    assert!(history[0].child_version_id.is_none());
}

#[tokio::test]
async fn rewriter_error_marks_cycle_terminal() {
    /// Rewriter whose backend is down
    struct FailingRewriter;

    #[async_trait]
    impl Rewriter for FailingRewriter {
        async fn generate(&self, _prompt: &str) -> cqe_common::Result<String> {
            Err(Error::Unavailable("model endpoint down".to_string()))
        }
    }

    let engine = test_engine(fast_config()).await;
    let (blog_id, parent_id) = seed_weak_version(&engine, "broken rewriter").await;

    let orchestrator = engine.orchestrator(Arc::new(FailingRewriter));
    let err = orchestrator.orchestrate_rewrite(parent_id, None).await.unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));

    let history = cycles::list_cycles_for_blog(&engine.pool, blog_id).await.unwrap();
    assert_eq!(history[0].stop_reason.as_deref(), Some("rewriter_error"));
}

#[tokio::test]
async fn version_without_finished_evaluation_is_refused() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("unevaluated", engine.writer.id, None)
        .await
        .unwrap();
    let version = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "never evaluated content here",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    let orchestrator = engine.orchestrator_with_output("unused");
    let err = orchestrator.orchestrate_rewrite(version.id, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn cycle_rows_are_write_once_where_it_counts() {
    let engine = test_engine(fast_config()).await;
    let (_, parent_id) = seed_weak_version(&engine, "cycle immutability").await;
    let cycle = cycles::insert_cycle(
        &engine.pool,
        cycles::NewCycle {
            parent_version_id: parent_id,
            cycle_number: 1,
            trigger_reasons: vec!["ai_likeness_high:ai_likeness_total".to_string()],
            trigger_data: serde_json::json!({}),
            rewrite_prompt: "the stored prompt".to_string(),
            parent_aeo_total: Some(50.0),
            parent_ai_likeness_total: Some(80.0),
            status: RewriteStatus::Pending,
            stop_reason: None,
        },
    )
    .await
    .unwrap();

    // Prompt is frozen.
    let update = sqlx::query("UPDATE rewrite_cycles SET rewrite_prompt = 'replaced' WHERE id = ?")
        .bind(cycle.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());

    // Duplicate (parent, cycle_number) conflicts.
    let err = cycles::insert_cycle(
        &engine.pool,
        cycles::NewCycle {
            parent_version_id: parent_id,
            cycle_number: 1,
            trigger_reasons: vec![],
            trigger_data: serde_json::json!({}),
            rewrite_prompt: "dup".to_string(),
            parent_aeo_total: None,
            parent_ai_likeness_total: None,
            status: RewriteStatus::Pending,
            stop_reason: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Status never moves backward once terminal.
    cycles::terminate_cycle(&engine.pool, cycle.id, "timeout", None)
        .await
        .unwrap();
    let update = sqlx::query("UPDATE rewrite_cycles SET rewrite_status = 'pending' WHERE id = ?")
        .bind(cycle.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());
}
