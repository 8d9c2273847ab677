//! Human review state machine
//!
//! DRAFT -> IN_REVIEW -> {APPROVED | REJECTED | ARCHIVED}; terminal states
//! never transition and later edits fork a new version instead. Approval is
//! timer-gated, human-only (verified against the actor row, never trusted
//! from the caller), and every attempt lands in the approval_attempts audit
//! table with its final result.

use crate::store::{
    approvals, reviews, versions::AppendVersion, ContentStore,
};
use cqe_common::config::EngineConfig;
use cqe_common::db::models::{
    ActorRole, ApprovalState, AttemptResult, EscalationReason, ReviewActionKind, ReviewState,
    Version, VersionReviewState,
};
use cqe_common::events::{EngineEvent, EventBus};
use cqe_common::{time, Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Window for counting a reviewer's fast approvals (co-signature gate)
const FAST_APPROVAL_WINDOW_SECONDS: i64 = 24 * 60 * 60;

/// Fast approvals within the window before a co-signature is required
const COSIGN_AFTER_FAST_APPROVALS: i64 = 3;

/// Window for counting repeated rejections by one reviewer
const REJECTION_WINDOW_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Rejections by the same reviewer within the window before escalation
const REJECTIONS_BEFORE_ESCALATION: i64 = 3;

/// Days in IN_REVIEW before a version auto-archives
const STALE_REVIEW_DAYS: i64 = 7;

/// Minimum rationale length for approve/reject
const MIN_RATIONALE_LENGTH: usize = 20;

/// Authoritative approve/reject eligibility snapshot for a version.
/// Transports render this; they never compute eligibility themselves.
#[derive(Debug, Clone)]
pub struct ApprovalEligibility {
    pub state: ReviewState,
    pub eligible: bool,
    /// Seconds left on the review timer when not yet eligible
    pub remaining_seconds: i64,
}

/// The review service
#[derive(Clone)]
pub struct ReviewService {
    pool: SqlitePool,
    store: ContentStore,
    config: EngineConfig,
    events: EventBus,
}

impl ReviewService {
    pub fn new(
        pool: SqlitePool,
        store: ContentStore,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            store,
            config,
            events,
        }
    }

    /// Move a version from DRAFT into IN_REVIEW and start its review clock.
    pub async fn start_review(
        &self,
        version_id: Uuid,
        actor_id: Uuid,
    ) -> Result<VersionReviewState> {
        let version = self.store.get_version(version_id).await?;
        self.store.get_actor(actor_id).await?;

        let state = reviews::get_review_state(&self.pool, version_id).await?;
        if !state.state.can_transition_to(ReviewState::InReview) {
            return Err(Error::InvalidState(format!(
                "version {version_id} is {} and cannot enter review",
                state.state.as_str()
            )));
        }

        let started_at = time::now();
        reviews::write_review_state(
            &self.pool,
            version_id,
            ReviewState::InReview,
            Some(started_at),
            None,
        )
        .await?;

        self.store
            .log_review_action(reviews::LogReviewAction {
                blog_version_id: version_id,
                reviewer_id: actor_id,
                action: ReviewActionKind::SubmitForReview,
                comments: None,
                is_override: false,
                justification: None,
                risk_acceptance_note: None,
            })
            .await?;

        self.emit_transition(version_id, state.state, ReviewState::InReview);
        info!(version_id = %version_id, "Review started");

        // Review-cycle limit per blog: exceeding it is a human-process smell
        // that needs intervention, not a hard stop.
        let cycles = reviews::count_review_cycles(&self.pool, version.blog_id).await?;
        if cycles > self.config.max_review_cycles_per_blog {
            warn!(
                blog_id = %version.blog_id,
                cycles,
                "Review cycle limit exceeded, escalating"
            );
            self.store
                .open_escalation(
                    version.blog_id,
                    version_id,
                    EscalationReason::PolicyViolation,
                    Some(serde_json::json!({
                        "kind": "review_cycle_limit",
                        "cycles": cycles,
                        "limit": self.config.max_review_cycles_per_blog,
                    })),
                )
                .await?;
        }

        reviews::get_review_state(&self.pool, version_id).await
    }

    /// Authoritative eligibility snapshot for approve/reject.
    pub async fn can_approve_or_reject(&self, version_id: Uuid) -> Result<ApprovalEligibility> {
        let state = reviews::get_review_state(&self.pool, version_id).await?;
        if state.state != ReviewState::InReview {
            return Ok(ApprovalEligibility {
                state: state.state,
                eligible: false,
                remaining_seconds: 0,
            });
        }
        let remaining = self.timer_remaining(&state);
        Ok(ApprovalEligibility {
            state: state.state,
            eligible: remaining <= 0,
            remaining_seconds: remaining.max(0),
        })
    }

    /// Approve a version. Time-gated, human-only, fully audited.
    ///
    /// `cosigner` satisfies the co-signature gate once the reviewer has
    /// accumulated too many fast approvals; it must be a human admin.
    pub async fn approve(
        &self,
        version_id: Uuid,
        reviewer_id: Uuid,
        rationale: &str,
        cosigner: Option<Uuid>,
    ) -> Result<ApprovalState> {
        let version = self.store.get_version(version_id).await.map_err(|e| match e {
            Error::NotFound(msg) => Error::InvalidVersion(msg),
            other => other,
        })?;
        let reviewer = self.store.get_actor(reviewer_id).await?;

        // Non-human principals are rejected and audited before anything else.
        if !reviewer.is_human {
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                false,
                AttemptResult::Forbidden,
                Some("User is not marked as human"),
            )
            .await?;
            return Err(Error::Forbidden("User is not marked as human".to_string()));
        }

        let state = reviews::get_review_state(&self.pool, version_id).await?;
        if state.state != ReviewState::InReview {
            let reason = format!(
                "version is {} and cannot be approved",
                state.state.as_str()
            );
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::InvalidState(reason));
        }

        let remaining = self.timer_remaining(&state);
        if remaining > 0 {
            let reason = format!("timer: {remaining}s of review time remaining");
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::InvalidState(reason));
        }

        // Rubber-stamp detection: approval within the fast window of the
        // version's creation is allowed but audited.
        let age_seconds = (time::now() - version.created_at).num_seconds();
        let fast = age_seconds < self.config.fast_approval_threshold_seconds;

        // Co-signature gate on repeat fast approvers.
        let recent_fast = approvals::count_recent_fast_approvals(
            &self.pool,
            reviewer_id,
            FAST_APPROVAL_WINDOW_SECONDS,
        )
        .await?;
        if recent_fast >= COSIGN_AFTER_FAST_APPROVALS {
            let cosigned = match cosigner {
                Some(cosigner_id) => {
                    let senior = self.store.get_actor(cosigner_id).await?;
                    senior.is_human && senior.role == ActorRole::Admin
                }
                None => false,
            };
            if !cosigned {
                self.log_attempt(
                    version.blog_id,
                    reviewer_id,
                    true,
                    AttemptResult::Forbidden,
                    Some("cosign_required"),
                )
                .await?;
                return Err(Error::Forbidden(
                    "cosign_required: a senior reviewer must approve alongside".to_string(),
                ));
            }
        }

        // Rationale is validated last, together with the recording step.
        if rationale.trim().len() < MIN_RATIONALE_LENGTH {
            let reason = format!("rationale must be at least {MIN_RATIONALE_LENGTH} characters");
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::Validation(reason));
        }

        let notes = if fast { Some("fast approval") } else { None };
        let approval = self
            .store
            .record_approval(version.blog_id, version_id, reviewer_id, notes)
            .await?;

        if fast {
            self.store
                .open_escalation(
                    version.blog_id,
                    version_id,
                    EscalationReason::PolicyViolation,
                    Some(serde_json::json!({
                        "kind": "fast_approval",
                        "version_age_seconds": age_seconds,
                        "threshold_seconds": self.config.fast_approval_threshold_seconds,
                        "approver_id": reviewer_id,
                    })),
                )
                .await?;
        }

        self.log_attempt(version.blog_id, reviewer_id, true, AttemptResult::Success, None)
            .await?;
        self.store
            .log_review_action(reviews::LogReviewAction {
                blog_version_id: version_id,
                reviewer_id,
                action: ReviewActionKind::Approve,
                comments: Some(rationale),
                is_override: false,
                justification: None,
                risk_acceptance_note: None,
            })
            .await?;

        let duration = self.elapsed_seconds(&state);
        reviews::write_review_state(
            &self.pool,
            version_id,
            ReviewState::Approved,
            None,
            duration,
        )
        .await?;
        self.emit_transition(version_id, ReviewState::InReview, ReviewState::Approved);

        info!(
            version_id = %version_id,
            reviewer_id = %reviewer_id,
            fast,
            review_duration_seconds = ?duration,
            "Version approved"
        );

        Ok(approval)
    }

    /// Reject a version. Terminal for the version; analogous gating.
    pub async fn reject(
        &self,
        version_id: Uuid,
        reviewer_id: Uuid,
        rationale: &str,
    ) -> Result<VersionReviewState> {
        let version = self.store.get_version(version_id).await.map_err(|e| match e {
            Error::NotFound(msg) => Error::InvalidVersion(msg),
            other => other,
        })?;
        let reviewer = self.store.get_actor(reviewer_id).await?;

        if !reviewer.is_human {
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                false,
                AttemptResult::Forbidden,
                Some("User is not marked as human"),
            )
            .await?;
            return Err(Error::Forbidden("User is not marked as human".to_string()));
        }

        let state = reviews::get_review_state(&self.pool, version_id).await?;
        if state.state != ReviewState::InReview {
            let reason = format!(
                "version is {} and cannot be rejected",
                state.state.as_str()
            );
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::InvalidState(reason));
        }

        let remaining = self.timer_remaining(&state);
        if remaining > 0 {
            let reason = format!("timer: {remaining}s of review time remaining");
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::InvalidState(reason));
        }

        if rationale.trim().len() < MIN_RATIONALE_LENGTH {
            let reason = format!("rationale must be at least {MIN_RATIONALE_LENGTH} characters");
            self.log_attempt(
                version.blog_id,
                reviewer_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::Validation(reason));
        }

        self.log_attempt(version.blog_id, reviewer_id, true, AttemptResult::Success, None)
            .await?;
        self.store
            .log_review_action(reviews::LogReviewAction {
                blog_version_id: version_id,
                reviewer_id,
                action: ReviewActionKind::Reject,
                comments: Some(rationale),
                is_override: false,
                justification: None,
                risk_acceptance_note: None,
            })
            .await?;

        let duration = self.elapsed_seconds(&state);
        reviews::write_review_state(
            &self.pool,
            version_id,
            ReviewState::Rejected,
            None,
            duration,
        )
        .await?;
        self.emit_transition(version_id, ReviewState::InReview, ReviewState::Rejected);

        // Repeated rejections by one reviewer call for reassignment.
        let rejections = reviews::count_recent_rejections(
            &self.pool,
            version.blog_id,
            reviewer_id,
            REJECTION_WINDOW_SECONDS,
        )
        .await?;
        if rejections >= REJECTIONS_BEFORE_ESCALATION {
            warn!(
                blog_id = %version.blog_id,
                reviewer_id = %reviewer_id,
                rejections,
                "Repeated rejections by one reviewer, escalating for reassignment"
            );
            self.store
                .open_escalation(
                    version.blog_id,
                    version_id,
                    EscalationReason::LowQuality,
                    Some(serde_json::json!({
                        "kind": "repeated_rejections",
                        "reviewer_id": reviewer_id,
                        "rejections": rejections,
                    })),
                )
                .await?;
        }

        info!(version_id = %version_id, reviewer_id = %reviewer_id, "Version rejected");
        reviews::get_review_state(&self.pool, version_id).await
    }

    /// Distinct override path: requires justification and a risk acceptance
    /// note, bypasses the review timer, and is logged with is_override set.
    pub async fn request_override(
        &self,
        version_id: Uuid,
        actor_id: Uuid,
        justification: &str,
        risk_acceptance_note: &str,
    ) -> Result<ApprovalState> {
        if justification.trim().is_empty() || risk_acceptance_note.trim().is_empty() {
            return Err(Error::Validation(
                "override requires justification and risk acceptance note".to_string(),
            ));
        }

        let version = self.store.get_version(version_id).await.map_err(|e| match e {
            Error::NotFound(msg) => Error::InvalidVersion(msg),
            other => other,
        })?;
        let actor = self.store.get_actor(actor_id).await?;

        if !actor.is_human {
            self.log_attempt(
                version.blog_id,
                actor_id,
                false,
                AttemptResult::Forbidden,
                Some("User is not marked as human"),
            )
            .await?;
            return Err(Error::Forbidden("User is not marked as human".to_string()));
        }

        let state = reviews::get_review_state(&self.pool, version_id).await?;
        if state.state.is_terminal() {
            let reason = format!(
                "version is {} and cannot be overridden",
                state.state.as_str()
            );
            self.log_attempt(
                version.blog_id,
                actor_id,
                true,
                AttemptResult::InvalidState,
                Some(&reason),
            )
            .await?;
            return Err(Error::InvalidState(reason));
        }

        let approval = self
            .store
            .record_approval(version.blog_id, version_id, actor_id, Some("override"))
            .await?;

        self.log_attempt(version.blog_id, actor_id, true, AttemptResult::Success, None)
            .await?;
        self.store
            .log_review_action(reviews::LogReviewAction {
                blog_version_id: version_id,
                reviewer_id: actor_id,
                action: ReviewActionKind::Approve,
                comments: Some("override approval"),
                is_override: true,
                justification: Some(justification),
                risk_acceptance_note: Some(risk_acceptance_note),
            })
            .await?;

        let old_state = state.state;
        reviews::write_review_state(
            &self.pool,
            version_id,
            ReviewState::Approved,
            None,
            self.elapsed_seconds(&state),
        )
        .await?;
        self.emit_transition(version_id, old_state, ReviewState::Approved);

        warn!(
            version_id = %version_id,
            actor_id = %actor_id,
            "Override approval recorded"
        );

        Ok(approval)
    }

    /// Manual edit while a version sits in review: the in-review version is
    /// left untouched and a child version (source human_edit) starts its own
    /// review life in DRAFT.
    pub async fn edit_during_review(
        &self,
        version_id: Uuid,
        new_content: &str,
        editor_id: Uuid,
    ) -> Result<Version> {
        let version = self.store.get_version(version_id).await?;
        self.store
            .append_version(AppendVersion {
                blog_id: version.blog_id,
                content: new_content,
                source: cqe_common::db::models::VersionSource::HumanEdit,
                parent_version_id: Some(version_id),
                change_reason: Some("manual edit during review"),
                source_rewrite_cycle_id: None,
                created_by: editor_id,
            })
            .await
    }

    /// Archive versions that sat in IN_REVIEW for too long. Returns the
    /// archived version ids.
    pub async fn archive_stale_reviews(&self) -> Result<Vec<Uuid>> {
        let cutoff = time::now() - chrono::Duration::days(STALE_REVIEW_DAYS);
        let stale = reviews::list_stale_in_review(&self.pool, cutoff).await?;

        let mut archived = Vec::with_capacity(stale.len());
        for state in stale {
            reviews::write_review_state(
                &self.pool,
                state.version_id,
                ReviewState::Archived,
                None,
                self.elapsed_seconds(&state),
            )
            .await?;
            self.emit_transition(state.version_id, ReviewState::InReview, ReviewState::Archived);
            info!(version_id = %state.version_id, "Stale review auto-archived");
            archived.push(state.version_id);
        }
        Ok(archived)
    }

    fn timer_remaining(&self, state: &VersionReviewState) -> i64 {
        match state.review_started_at {
            Some(started) => {
                let elapsed = (time::now() - started).num_seconds();
                self.config.min_review_duration_seconds - elapsed
            }
            None => self.config.min_review_duration_seconds,
        }
    }

    fn elapsed_seconds(&self, state: &VersionReviewState) -> Option<i64> {
        state
            .review_started_at
            .map(|started| (time::now() - started).num_seconds())
    }

    async fn log_attempt(
        &self,
        blog_id: Uuid,
        attempted_by: Uuid,
        is_human: bool,
        result: AttemptResult,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        approvals::log_attempt(
            &self.pool,
            blog_id,
            attempted_by,
            is_human,
            result,
            failure_reason,
        )
        .await?;
        Ok(())
    }

    fn emit_transition(&self, version_id: Uuid, old_state: ReviewState, new_state: ReviewState) {
        self.events.emit(EngineEvent::ReviewStateChanged {
            version_id,
            old_state: old_state.as_str().to_string(),
            new_state: new_state.as_str().to_string(),
            timestamp: time::now(),
        });
    }
}
