//! Content store
//!
//! Exclusive owner of the Blog, Version, Approval*, HumanReviewAction, and
//! Escalation tables. Everything here is a thin, transaction-aware layer
//! over the storage constraints installed by `cqe_common::db::init`; the
//! triggers remain the canonical enforcement.
//!
//! Failure semantics: storage errors surface as database errors, constraint
//! races as `conflict`, invariant checks as `validation`. Nothing is retried
//! inside the store.

pub mod actors;
pub mod approvals;
pub mod blogs;
pub mod escalations;
pub mod reviews;
pub mod versions;

use chrono::{DateTime, Utc};
use cqe_common::db::models::{
    Actor, ApprovalState, Blog, Escalation, EscalationReason, HumanReviewAction, ReviewActionKind,
    Version, VersionSource,
};
use cqe_common::events::EventBus;
use cqe_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Handle over the content-store tables
///
/// Cheap to clone; all clones share the pool and event bus.
#[derive(Clone)]
pub struct ContentStore {
    pool: SqlitePool,
    events: EventBus,
}

impl ContentStore {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // -- blogs ------------------------------------------------------------

    pub async fn create_blog(
        &self,
        name: &str,
        created_by: Uuid,
        project_id: Option<&str>,
    ) -> Result<Blog> {
        blogs::create_blog(&self.pool, name, created_by, project_id).await
    }

    pub async fn get_blog(&self, id: Uuid) -> Result<Blog> {
        blogs::get_blog(&self.pool, id).await
    }

    // -- versions ---------------------------------------------------------

    pub async fn append_version(&self, request: versions::AppendVersion<'_>) -> Result<Version> {
        let version = versions::append_version(&self.pool, request).await?;
        self.events.emit(cqe_common::events::EngineEvent::VersionAppended {
            blog_id: version.blog_id,
            version_id: version.id,
            version_number: version.version_number,
            source: version.source.as_str().to_string(),
            timestamp: version.created_at,
        });
        Ok(version)
    }

    pub async fn get_version(&self, id: Uuid) -> Result<Version> {
        versions::get_version(&self.pool, id).await
    }

    pub async fn list_versions(&self, blog_id: Uuid) -> Result<Vec<Version>> {
        versions::list_versions(&self.pool, blog_id).await
    }

    // -- actors -----------------------------------------------------------

    pub async fn get_actor(&self, id: Uuid) -> Result<Actor> {
        actors::get_actor(&self.pool, id).await
    }

    // -- approvals --------------------------------------------------------

    pub async fn record_approval(
        &self,
        blog_id: Uuid,
        version_id: Uuid,
        approver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<ApprovalState> {
        let approval =
            approvals::record_approval(&self.pool, blog_id, version_id, approver_id, notes).await?;
        self.events.emit(cqe_common::events::EngineEvent::ApprovalRecorded {
            blog_id,
            version_id,
            approver_id,
            timestamp: approval.approved_at,
        });
        Ok(approval)
    }

    pub async fn revoke_approval(
        &self,
        blog_id: Uuid,
        revoked_by: Uuid,
        reason: &str,
    ) -> Result<ApprovalState> {
        let revocation = approvals::revoke_approval(&self.pool, blog_id, revoked_by, reason).await?;
        self.events.emit(cqe_common::events::EngineEvent::ApprovalRevoked {
            blog_id,
            revoked_by,
            timestamp: revocation.revoked_at.unwrap_or(revocation.approved_at),
        });
        Ok(revocation)
    }

    pub async fn current_approval(&self, blog_id: Uuid) -> Result<Option<ApprovalState>> {
        approvals::current_approval(&self.pool, blog_id).await
    }

    // -- review audit -----------------------------------------------------

    pub async fn log_review_action(
        &self,
        request: reviews::LogReviewAction<'_>,
    ) -> Result<HumanReviewAction> {
        reviews::log_review_action(&self.pool, request).await
    }

    pub async fn list_review_actions(
        &self,
        version_id: Uuid,
        action: Option<ReviewActionKind>,
    ) -> Result<Vec<HumanReviewAction>> {
        reviews::list_review_actions(&self.pool, version_id, action).await
    }

    // -- escalations ------------------------------------------------------

    pub async fn open_escalation(
        &self,
        blog_id: Uuid,
        version_id: Uuid,
        reason: EscalationReason,
        details: Option<serde_json::Value>,
    ) -> Result<Escalation> {
        let escalation =
            escalations::open_escalation(&self.pool, blog_id, version_id, reason, details).await?;
        self.events.emit(cqe_common::events::EngineEvent::EscalationOpened {
            blog_id,
            version_id,
            reason: reason.as_str().to_string(),
            timestamp: escalation.created_at,
        });
        Ok(escalation)
    }

    pub async fn resolve_escalation(
        &self,
        escalation_id: Uuid,
        resolved_by: Uuid,
        dismissed: bool,
    ) -> Result<Escalation> {
        escalations::resolve_escalation(&self.pool, escalation_id, resolved_by, dismissed).await
    }

    /// Derived: a blog is escalated while it has open escalations.
    pub async fn is_escalated(&self, blog_id: Uuid) -> Result<bool> {
        escalations::is_escalated(&self.pool, blog_id).await
    }
}

// -- shared row-mapping helpers -------------------------------------------

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_source(s: &str) -> Result<VersionSource> {
    VersionSource::parse(s)
        .ok_or_else(|| Error::Internal(format!("unknown version source in database: '{s}'")))
}
