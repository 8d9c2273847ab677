//! Escalation queries
//!
//! An escalation is an automation hard-stop awaiting human intervention.
//! There is no mutable "is_escalated" flag anywhere; the state is derived by
//! querying open escalations.

use super::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid};
use cqe_common::db::models::{Escalation, EscalationReason, EscalationStatus};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

pub async fn open_escalation(
    pool: &SqlitePool,
    blog_id: Uuid,
    version_id: Uuid,
    reason: EscalationReason,
    details: Option<serde_json::Value>,
) -> Result<Escalation> {
    let id = uuid_utils::generate();
    let created_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO escalations (id, blog_id, version_id, reason, details, status, created_at)
        VALUES (?, ?, ?, ?, ?, 'pending_review', ?)
        "#,
    )
    .bind(id.to_string())
    .bind(blog_id.to_string())
    .bind(version_id.to_string())
    .bind(reason.as_str())
    .bind(details.as_ref().map(|d| d.to_string()))
    .bind(time::to_db(created_at))
    .execute(pool)
    .await?;

    warn!(
        blog_id = %blog_id,
        version_id = %version_id,
        reason = reason.as_str(),
        "Escalation opened"
    );

    Ok(Escalation {
        id,
        blog_id,
        version_id,
        reason,
        details,
        status: EscalationStatus::PendingReview,
        created_at,
        resolved_at: None,
        resolved_by: None,
    })
}

/// Close an escalation as resolved or dismissed.
pub async fn resolve_escalation(
    pool: &SqlitePool,
    escalation_id: Uuid,
    resolved_by: Uuid,
    dismissed: bool,
) -> Result<Escalation> {
    let existing = get_escalation(pool, escalation_id).await?;
    if existing.status != EscalationStatus::PendingReview {
        return Err(Error::InvalidState(format!(
            "escalation {escalation_id} is already {}",
            existing.status.as_str()
        )));
    }

    let status = if dismissed {
        EscalationStatus::Dismissed
    } else {
        EscalationStatus::Resolved
    };
    let resolved_at = time::now();

    sqlx::query(
        r#"
        UPDATE escalations
        SET status = ?, resolved_at = ?, resolved_by = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(time::to_db(resolved_at))
    .bind(resolved_by.to_string())
    .bind(escalation_id.to_string())
    .execute(pool)
    .await?;

    Ok(Escalation {
        status,
        resolved_at: Some(resolved_at),
        resolved_by: Some(resolved_by),
        ..existing
    })
}

pub async fn get_escalation(pool: &SqlitePool, id: Uuid) -> Result<Escalation> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_id, version_id, reason, details, status,
               created_at, resolved_at, resolved_by
        FROM escalations
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("escalation {id} does not exist")))?;

    map_escalation(&row)
}

/// Open escalations for a blog, oldest first.
pub async fn list_open(pool: &SqlitePool, blog_id: Uuid) -> Result<Vec<Escalation>> {
    let rows = sqlx::query(
        r#"
        SELECT id, blog_id, version_id, reason, details, status,
               created_at, resolved_at, resolved_by
        FROM escalations
        WHERE blog_id = ? AND status = 'pending_review'
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_escalation).collect()
}

/// Derived escalated state.
pub async fn is_escalated(pool: &SqlitePool, blog_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM escalations WHERE blog_id = ? AND status = 'pending_review'",
    )
    .bind(blog_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

fn map_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<Escalation> {
    let id_str: String = row.get("id");
    let blog_str: String = row.get("blog_id");
    let version_str: String = row.get("version_id");
    let reason_str: String = row.get("reason");
    let details_str: Option<String> = row.get("details");
    let status_str: String = row.get("status");
    let created_str: String = row.get("created_at");
    let resolved_at_str: Option<String> = row.get("resolved_at");
    let resolved_by_str: Option<String> = row.get("resolved_by");

    let details = details_str
        .map(|d| serde_json::from_str(&d))
        .transpose()
        .map_err(|e| Error::Internal(format!("malformed escalation details: {e}")))?;

    Ok(Escalation {
        id: parse_uuid(&id_str)?,
        blog_id: parse_uuid(&blog_str)?,
        version_id: parse_uuid(&version_str)?,
        reason: EscalationReason::parse(&reason_str)
            .ok_or_else(|| Error::Internal(format!("unknown escalation reason '{reason_str}'")))?,
        details,
        status: EscalationStatus::parse(&status_str)
            .ok_or_else(|| Error::Internal(format!("unknown escalation status '{status_str}'")))?,
        created_at: parse_ts(&created_str)?,
        resolved_at: parse_opt_ts(resolved_at_str)?,
        resolved_by: parse_opt_uuid(resolved_by_str)?,
    })
}
