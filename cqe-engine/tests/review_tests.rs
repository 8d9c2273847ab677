//! Review state machine integration tests
//!
//! Timer gating, human verification, rubber-stamp auditing, co-signature
//! gate, override path, manual-edit forking, escalations, and auto-archive.

mod helpers;

use cqe_common::config::EngineConfig;
use cqe_common::db::models::{
    AttemptResult, EscalationReason, ReviewActionKind, ReviewState, VersionSource,
};
use cqe_engine::store::{approvals, reviews, versions::AppendVersion};
use cqe_engine::Error;
use helpers::{fast_config, test_engine, TestEngine};
use std::time::Duration;
use uuid::Uuid;

async fn seed_version(engine: &TestEngine, name: &str) -> (Uuid, Uuid) {
    let blog = engine
        .store
        .create_blog(name, engine.writer.id, None)
        .await
        .unwrap();
    let version = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "reviewable content for the approval tests",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    (blog.id, version.id)
}

const RATIONALE: &str = "Meets the editorial quality standard.";

#[tokio::test]
async fn approve_happy_path_sets_current_approval() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "happy path").await;

    engine.review.start_review(version_id, engine.writer.id).await.unwrap();
    let approval = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap();
    assert_eq!(approval.approved_version_id, version_id);

    let current = engine.store.current_approval(blog_id).await.unwrap().unwrap();
    assert_eq!(current.approved_version_id, version_id);

    let state = reviews::get_review_state(&engine.pool, version_id).await.unwrap();
    assert_eq!(state.state, ReviewState::Approved);
    assert!(state.review_duration_seconds.is_some());

    // Audit rows: a successful attempt plus the APPROVE action.
    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].result, AttemptResult::Success);
    assert!(attempts[0].is_human_snapshot);

    let actions = engine
        .store
        .list_review_actions(version_id, Some(ReviewActionKind::Approve))
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].comments.as_deref(), Some(RATIONALE));
}

#[tokio::test]
async fn service_account_approval_is_forbidden_and_audited() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "robot").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let err = engine
        .review
        .approve(version_id, engine.robot.id, RATIONALE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].result, AttemptResult::Forbidden);
    assert!(!attempts[0].is_human_snapshot);
    assert_eq!(
        attempts[0].failure_reason.as_deref(),
        Some("User is not marked as human")
    );
    assert!(engine.store.current_approval(blog_id).await.unwrap().is_none());
}

#[tokio::test]
async fn review_timer_gates_approval() {
    let config = EngineConfig {
        min_review_duration_seconds: 2,
        fast_approval_threshold_seconds: 0,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;
    let (blog_id, version_id) = seed_version(&engine, "timer").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    // Below the threshold: refused with the remaining seconds surfaced.
    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap_err();
    match err {
        Error::InvalidState(msg) => assert!(msg.contains("timer"), "{msg}"),
        other => panic!("expected invalid_state, got {other}"),
    }

    let eligibility = engine.review.can_approve_or_reject(version_id).await.unwrap();
    assert!(!eligibility.eligible);
    assert!(eligibility.remaining_seconds > 0);

    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts[0].result, AttemptResult::InvalidState);

    // At the threshold: allowed.
    tokio::time::sleep(Duration::from_millis(2200)).await;
    let eligibility = engine.review.can_approve_or_reject(version_id).await.unwrap();
    assert!(eligibility.eligible);
    engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn approving_a_draft_is_invalid_state() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "draft").await;

    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts[0].result, AttemptResult::InvalidState);
}

#[tokio::test]
async fn short_rationale_is_rejected() {
    let engine = test_engine(fast_config()).await;
    let (_, version_id) = seed_version(&engine, "rationale").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, "too short", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn fast_approval_is_marked_and_audited() {
    // A deployment with a short review timer still audits rubber-stamps.
    let config = EngineConfig {
        min_review_duration_seconds: 0,
        fast_approval_threshold_seconds: 30,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;
    let (blog_id, version_id) = seed_version(&engine, "rubber stamp").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let approval = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap();
    assert_eq!(approval.notes.as_deref(), Some("fast approval"));

    // The audit record is an escalation-like row describing the fast approval.
    let open = cqe_engine::store::escalations::list_open(&engine.pool, blog_id)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].reason, EscalationReason::PolicyViolation);
    assert_eq!(open[0].details.as_ref().unwrap()["kind"], "fast_approval");
}

#[tokio::test]
async fn repeat_fast_approvers_need_a_cosigner() {
    let config = EngineConfig {
        min_review_duration_seconds: 0,
        fast_approval_threshold_seconds: 3600,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;

    // Three fast approvals by the same reviewer inside the window.
    for i in 0..3 {
        let (_, version_id) = seed_version(&engine, &format!("fast {i}")).await;
        engine.review.start_review(version_id, engine.writer.id).await.unwrap();
        engine
            .review
            .approve(version_id, engine.reviewer.id, RATIONALE, None)
            .await
            .unwrap();
    }

    // The fourth attempt trips the gate.
    let (blog_id, version_id) = seed_version(&engine, "needs cosign").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();
    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap_err();
    match err {
        Error::Forbidden(msg) => assert!(msg.contains("cosign_required"), "{msg}"),
        other => panic!("expected forbidden, got {other}"),
    }
    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts[0].failure_reason.as_deref(), Some("cosign_required"));

    // A human admin co-signature unblocks it.
    engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, Some(engine.admin.id))
        .await
        .unwrap();
}

#[tokio::test]
async fn cosign_gate_fires_before_rationale_validation() {
    let config = EngineConfig {
        min_review_duration_seconds: 0,
        fast_approval_threshold_seconds: 3600,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;

    for i in 0..3 {
        let (_, version_id) = seed_version(&engine, &format!("gate order {i}")).await;
        engine.review.start_review(version_id, engine.writer.id).await.unwrap();
        engine
            .review
            .approve(version_id, engine.reviewer.id, RATIONALE, None)
            .await
            .unwrap();
    }

    // With the gate already tripped, a too-short rationale and no cosigner
    // must still surface as the co-signature refusal.
    let (blog_id, version_id) = seed_version(&engine, "gate beats rationale").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();
    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, "too short", None)
        .await
        .unwrap_err();
    match err {
        Error::Forbidden(msg) => assert!(msg.contains("cosign_required"), "{msg}"),
        other => panic!("expected forbidden, got {other}"),
    }

    let attempts = approvals::list_attempts(&engine.pool, blog_id).await.unwrap();
    assert_eq!(attempts[0].result, AttemptResult::Forbidden);
    assert_eq!(attempts[0].failure_reason.as_deref(), Some("cosign_required"));
}

#[tokio::test]
async fn reject_is_terminal_and_repeat_rejections_escalate() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("rejections", engine.writer.id, None)
        .await
        .unwrap();

    let mut parent = None;
    for round in 0..3 {
        let version = engine
            .store
            .append_version(AppendVersion {
                blog_id: blog.id,
                content: &format!("draft number {round} of this blog"),
                source: if parent.is_none() {
                    VersionSource::HumanPaste
                } else {
                    VersionSource::HumanEdit
                },
                parent_version_id: parent,
                change_reason: None,
                source_rewrite_cycle_id: None,
                created_by: engine.writer.id,
            })
            .await
            .unwrap();
        parent = Some(version.id);

        engine.review.start_review(version.id, engine.writer.id).await.unwrap();
        engine
            .review
            .reject(version.id, engine.reviewer.id, "Not up to standard, rework needed.")
            .await
            .unwrap();

        let state = reviews::get_review_state(&engine.pool, version.id).await.unwrap();
        assert_eq!(state.state, ReviewState::Rejected);

        // Terminal: no further transitions.
        let err = engine
            .review
            .approve(version.id, engine.reviewer.id, RATIONALE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    // Third rejection by the same reviewer within the window escalates.
    let open = cqe_engine::store::escalations::list_open(&engine.pool, blog.id)
        .await
        .unwrap();
    assert!(open
        .iter()
        .any(|e| e.reason == EscalationReason::LowQuality
            && e.details.as_ref().unwrap()["kind"] == "repeated_rejections"));
}

#[tokio::test]
async fn manual_edit_forks_a_draft_and_leaves_review_untouched() {
    let engine = test_engine(fast_config()).await;
    let (_, version_id) = seed_version(&engine, "edited in review").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let child = engine
        .review
        .edit_during_review(version_id, "revised wording after feedback", engine.writer.id)
        .await
        .unwrap();

    assert_eq!(child.source, VersionSource::HumanEdit);
    assert_eq!(child.parent_version_id, Some(version_id));

    let child_state = reviews::get_review_state(&engine.pool, child.id).await.unwrap();
    assert_eq!(child_state.state, ReviewState::Draft);
    assert!(child_state.review_started_at.is_none());

    let parent_state = reviews::get_review_state(&engine.pool, version_id).await.unwrap();
    assert_eq!(parent_state.state, ReviewState::InReview);
}

#[tokio::test]
async fn override_requires_justification_and_is_logged() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "override").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let err = engine
        .review
        .request_override(version_id, engine.admin.id, "", "risk accepted")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let approval = engine
        .review
        .request_override(
            version_id,
            engine.admin.id,
            "Legal deadline requires publication today",
            "Residual quality risk accepted by the admin on call",
        )
        .await
        .unwrap();
    assert_eq!(approval.notes.as_deref(), Some("override"));

    let actions = engine.store.list_review_actions(version_id, None).await.unwrap();
    let override_action = actions.iter().find(|a| a.is_override).unwrap();
    assert!(override_action.justification.is_some());
    assert!(override_action.risk_acceptance_note.is_some());

    let current = engine.store.current_approval(blog_id).await.unwrap().unwrap();
    assert_eq!(current.approved_version_id, version_id);
}

#[tokio::test]
async fn stale_reviews_auto_archive() {
    let engine = test_engine(fast_config()).await;
    let (_, version_id) = seed_version(&engine, "stale").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    // Backdate the review clock past the staleness window.
    let eight_days_ago = chrono::Utc::now() - chrono::Duration::days(8);
    reviews::write_review_state(
        &engine.pool,
        version_id,
        ReviewState::InReview,
        Some(eight_days_ago),
        None,
    )
    .await
    .unwrap();

    let archived = engine.review.archive_stale_reviews().await.unwrap();
    assert_eq!(archived, vec![version_id]);

    let state = reviews::get_review_state(&engine.pool, version_id).await.unwrap();
    assert_eq!(state.state, ReviewState::Archived);

    // Archived is terminal.
    let err = engine
        .review
        .approve(version_id, engine.reviewer.id, RATIONALE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn review_cycle_limit_opens_escalation() {
    let config = EngineConfig {
        min_review_duration_seconds: 0,
        fast_approval_threshold_seconds: 0,
        max_review_cycles_per_blog: 1,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;
    let blog = engine
        .store
        .create_blog("churning", engine.writer.id, None)
        .await
        .unwrap();
    let v1 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "first submitted draft",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    let v2 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "second submitted draft",
            source: VersionSource::HumanEdit,
            parent_version_id: Some(v1.id),
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    engine.review.start_review(v1.id, engine.writer.id).await.unwrap();
    assert!(!engine.store.is_escalated(blog.id).await.unwrap());

    engine.review.start_review(v2.id, engine.writer.id).await.unwrap();
    let open = cqe_engine::store::escalations::list_open(&engine.pool, blog.id)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].details.as_ref().unwrap()["kind"], "review_cycle_limit");
}

#[tokio::test]
async fn rejecting_before_the_timer_is_gated_too() {
    let config = EngineConfig {
        min_review_duration_seconds: 300,
        fast_approval_threshold_seconds: 0,
        enabled_detectors: vec![],
        ..EngineConfig::default()
    };
    let engine = test_engine(config).await;
    let (_, version_id) = seed_version(&engine, "reject timer").await;
    engine.review.start_review(version_id, engine.writer.id).await.unwrap();

    let err = engine
        .review
        .reject(version_id, engine.reviewer.id, "Rejecting with a long enough rationale.")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}
