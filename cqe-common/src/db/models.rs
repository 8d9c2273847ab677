//! Shared row models and string-backed enums
//!
//! All ids are UUIDv4 stored as TEXT; all timestamps are RFC 3339 TEXT in
//! UTC. Enums are stored as their `as_str` form and validated by CHECK
//! constraints in the schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Writer,
    Reviewer,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Writer => "writer",
            ActorRole::Reviewer => "reviewer",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "writer" => Some(ActorRole::Writer),
            "reviewer" => Some(ActorRole::Reviewer),
            "admin" => Some(ActorRole::Admin),
            "system" => Some(ActorRole::System),
            _ => None,
        }
    }
}

/// A principal known to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: ActorRole,
    pub is_human: bool,
    pub created_at: DateTime<Utc>,
}

/// Stable content identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: Uuid,
    /// Human-provided, immutable after creation
    pub name: String,
    /// Optional project grouping key
    pub project_id: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Origin of a content version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    HumanPaste,
    AiRewrite,
    HumanEdit,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::HumanPaste => "human_paste",
            VersionSource::AiRewrite => "ai_rewrite",
            VersionSource::HumanEdit => "human_edit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "human_paste" => Some(VersionSource::HumanPaste),
            "ai_rewrite" => Some(VersionSource::AiRewrite),
            "human_edit" => Some(VersionSource::HumanEdit),
            _ => None,
        }
    }
}

/// Immutable content snapshot of a blog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub blog_id: Uuid,
    /// NULL only for the root version (version_number 1)
    pub parent_version_id: Option<Uuid>,
    pub content: String,
    /// SHA-256 over `content`, lower hex
    pub content_hash: String,
    /// Per-blog, >= 1, strictly monotone (gaps tolerated)
    pub version_number: i64,
    pub source: VersionSource,
    /// Required iff source is ai_rewrite
    pub source_rewrite_cycle_id: Option<Uuid>,
    pub change_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Status of an evaluation run
///
/// Only advances: processing -> {completed, partial_failure, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Processing,
    Completed,
    PartialFailure,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::PartialFailure => "partial_failure",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(RunStatus::Processing),
            "completed" => Some(RunStatus::Completed),
            "partial_failure" => Some(RunStatus::PartialFailure),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    /// True once the run left processing
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Processing)
    }
}

/// Orchestration envelope of one evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: Uuid,
    pub blog_version_id: Uuid,
    pub run_at: DateTime<Utc>,
    /// NULL means the run was triggered by the system
    pub triggered_by: Option<Uuid>,
    /// Immutable snapshot of scorer configuration
    pub model_config: serde_json::Value,
    pub status: RunStatus,
    /// Write-once when status leaves processing
    pub completed_at: Option<DateTime<Utc>>,
}

/// AI-likeness score row, one per (run, provider)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorScore {
    pub id: Uuid,
    pub run_id: Uuid,
    pub provider: String,
    /// 0..=100
    pub score: f64,
    /// Must include model_version, raw_response, timestamp
    pub details: serde_json::Value,
}

/// AEO score row, one per (run, query intent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeoScore {
    pub id: Uuid,
    pub run_id: Uuid,
    pub query_intent: String,
    /// 0..=100
    pub score: f64,
    pub rationale: Option<String>,
    /// Pillar breakdown and extracted signals
    pub details: serde_json::Value,
}

/// Score-trend classification of a rewrite cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendOutcome {
    Improving,
    PartialImprovement,
    Stagnant,
    Regressing,
}

impl TrendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendOutcome::Improving => "improving",
            TrendOutcome::PartialImprovement => "partial_improvement",
            TrendOutcome::Stagnant => "stagnant",
            TrendOutcome::Regressing => "regressing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "improving" => Some(TrendOutcome::Improving),
            "partial_improvement" => Some(TrendOutcome::PartialImprovement),
            "stagnant" => Some(TrendOutcome::Stagnant),
            "regressing" => Some(TrendOutcome::Regressing),
            _ => None,
        }
    }

    /// Numeric trend code stored alongside the outcome
    pub fn code(&self) -> i64 {
        match self {
            TrendOutcome::Improving => 1,
            TrendOutcome::PartialImprovement => 2,
            TrendOutcome::Stagnant => 3,
            TrendOutcome::Regressing => 4,
        }
    }
}

/// Status of a rewrite cycle
///
/// Only advances: pending -> {completed, terminal}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStatus {
    Pending,
    Completed,
    Terminal,
}

impl RewriteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteStatus::Pending => "pending",
            RewriteStatus::Completed => "completed",
            RewriteStatus::Terminal => "terminal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RewriteStatus::Pending),
            "completed" => Some(RewriteStatus::Completed),
            "terminal" => Some(RewriteStatus::Terminal),
            _ => None,
        }
    }
}

/// One orchestrated rewrite attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteCycle {
    pub id: Uuid,
    pub parent_version_id: Uuid,
    /// NULL until the child version is appended
    pub child_version_id: Option<Uuid>,
    /// Per parent version, >= 1
    pub cycle_number: i64,
    pub trigger_reasons: Vec<String>,
    pub trigger_data: serde_json::Value,
    /// Verbatim filled prompt, stored before the external call
    pub rewrite_prompt: String,
    pub parent_aeo_total: Option<f64>,
    pub parent_ai_likeness_total: Option<f64>,
    pub child_aeo_total: Option<f64>,
    pub child_ai_likeness_total: Option<f64>,
    pub trend_outcome: Option<TrendOutcome>,
    pub trend_code: Option<i64>,
    pub rewrite_status: RewriteStatus,
    pub stop_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Declared approval of a blog version
///
/// Rows are write-once. A revocation is a companion row carrying the
/// revocation fields; the "current approval" is the newest row for the blog,
/// and a revoked newest row means no current approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalState {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub approved_version_id: Uuid,
    pub approver_id: Uuid,
    pub approved_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<Uuid>,
    pub revocation_reason: Option<String>,
    pub notes: Option<String>,
}

/// Result of an approval attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Success,
    Forbidden,
    InvalidState,
    InvalidVersion,
}

impl AttemptResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptResult::Success => "success",
            AttemptResult::Forbidden => "forbidden",
            AttemptResult::InvalidState => "invalid_state",
            AttemptResult::InvalidVersion => "invalid_version",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AttemptResult::Success),
            "forbidden" => Some(AttemptResult::Forbidden),
            "invalid_state" => Some(AttemptResult::InvalidState),
            "invalid_version" => Some(AttemptResult::InvalidVersion),
            _ => None,
        }
    }
}

/// Audit row for every approval attempt, success or failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAttempt {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub attempted_by: Uuid,
    /// is_human of the attempting actor at attempt time
    pub is_human_snapshot: bool,
    pub result: AttemptResult,
    pub attempted_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

/// Kind of logged human review event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewActionKind {
    Approve,
    Reject,
    Comment,
    RequestChanges,
    ApproveIntent,
    SubmitForReview,
}

impl ReviewActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewActionKind::Approve => "APPROVE",
            ReviewActionKind::Reject => "REJECT",
            ReviewActionKind::Comment => "COMMENT",
            ReviewActionKind::RequestChanges => "REQUEST_CHANGES",
            ReviewActionKind::ApproveIntent => "APPROVE_INTENT",
            ReviewActionKind::SubmitForReview => "SUBMIT_FOR_REVIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVE" => Some(ReviewActionKind::Approve),
            "REJECT" => Some(ReviewActionKind::Reject),
            "COMMENT" => Some(ReviewActionKind::Comment),
            "REQUEST_CHANGES" => Some(ReviewActionKind::RequestChanges),
            "APPROVE_INTENT" => Some(ReviewActionKind::ApproveIntent),
            "SUBMIT_FOR_REVIEW" => Some(ReviewActionKind::SubmitForReview),
            _ => None,
        }
    }
}

/// Logged human review event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanReviewAction {
    pub id: Uuid,
    pub blog_version_id: Uuid,
    pub reviewer_id: Uuid,
    pub action: ReviewActionKind,
    pub comments: Option<String>,
    pub is_override: bool,
    pub justification: Option<String>,
    pub risk_acceptance_note: Option<String>,
    pub performed_at: DateTime<Utc>,
}

/// Why an escalation was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    ScoreRegression,
    PolicyViolation,
    Ambiguity,
    LowQuality,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::ScoreRegression => "score_regression",
            EscalationReason::PolicyViolation => "policy_violation",
            EscalationReason::Ambiguity => "ambiguity",
            EscalationReason::LowQuality => "low_quality",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "score_regression" => Some(EscalationReason::ScoreRegression),
            "policy_violation" => Some(EscalationReason::PolicyViolation),
            "ambiguity" => Some(EscalationReason::Ambiguity),
            "low_quality" => Some(EscalationReason::LowQuality),
            _ => None,
        }
    }
}

/// Escalation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    PendingReview,
    Resolved,
    Dismissed,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::PendingReview => "pending_review",
            EscalationStatus::Resolved => "resolved",
            EscalationStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(EscalationStatus::PendingReview),
            "resolved" => Some(EscalationStatus::Resolved),
            "dismissed" => Some(EscalationStatus::Dismissed),
            _ => None,
        }
    }
}

/// An automation hard-stop awaiting human intervention
///
/// A blog's "escalated" state is derived by querying open escalations;
/// there is no mutable flag anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub version_id: Uuid,
    pub reason: EscalationReason,
    pub details: Option<serde_json::Value>,
    pub status: EscalationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

/// Review state of a single version
///
/// DRAFT -> IN_REVIEW -> {APPROVED | REJECTED | ARCHIVED}; terminal states
/// never transition. Edits create a new version with its own state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Draft,
    InReview,
    Approved,
    Rejected,
    Archived,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Draft => "draft",
            ReviewState::InReview => "in_review",
            ReviewState::Approved => "approved",
            ReviewState::Rejected => "rejected",
            ReviewState::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ReviewState::Draft),
            "in_review" => Some(ReviewState::InReview),
            "approved" => Some(ReviewState::Approved),
            "rejected" => Some(ReviewState::Rejected),
            "archived" => Some(ReviewState::Archived),
            _ => None,
        }
    }

    /// Whether this state allows a transition to `next`
    pub fn can_transition_to(&self, next: ReviewState) -> bool {
        matches!(
            (self, next),
            (ReviewState::Draft, ReviewState::InReview)
                | (ReviewState::Draft, ReviewState::Archived)
                | (ReviewState::InReview, ReviewState::Approved)
                | (ReviewState::InReview, ReviewState::Rejected)
                | (ReviewState::InReview, ReviewState::Archived)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewState::Approved | ReviewState::Rejected | ReviewState::Archived
        )
    }
}

/// Mutable review-state row backing the per-version state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionReviewState {
    pub version_id: Uuid,
    pub blog_id: Uuid,
    pub state: ReviewState,
    /// Server-side timestamp of the transition into IN_REVIEW
    pub review_started_at: Option<DateTime<Utc>>,
    /// Snapshot taken when the review reaches a terminal action
    pub review_duration_seconds: Option<i64>,
    pub updated_at: DateTime<Utc>,
}
