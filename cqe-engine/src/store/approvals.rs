//! Approval queries
//!
//! approval_states rows are write-once. Revocation is a companion row
//! carrying the revocation fields; the "current approval" of a blog is its
//! newest row by (approved_at, id), and a revoked newest row means the blog
//! has no current approval. approval_attempts is the append-only audit of
//! every attempt, inserted with its final result.

use super::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid};
use cqe_common::db::models::{ApprovalAttempt, ApprovalState, AttemptResult};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

/// Record an approval of a version.
///
/// Storage-level preconditions (also trigger-enforced): the approver must be
/// a human actor and the version must belong to the blog. A repeat call that
/// matches the blog's current approval returns the existing row instead of
/// inserting a duplicate.
pub async fn record_approval(
    pool: &SqlitePool,
    blog_id: Uuid,
    version_id: Uuid,
    approver_id: Uuid,
    notes: Option<&str>,
) -> Result<ApprovalState> {
    let approver = super::actors::get_actor(pool, approver_id).await?;
    if !approver.is_human {
        return Err(Error::Forbidden(
            "User is not marked as human".to_string(),
        ));
    }

    let version = super::versions::get_version(pool, version_id)
        .await
        .map_err(|e| match e {
            Error::NotFound(msg) => Error::InvalidVersion(msg),
            other => other,
        })?;
    if version.blog_id != blog_id {
        return Err(Error::InvalidVersion(format!(
            "version {version_id} does not belong to blog {blog_id}"
        )));
    }

    // Idempotency: the same logical attempt repeated returns the current row.
    if let Some(current) = current_approval(pool, blog_id).await? {
        if current.approved_version_id == version_id && current.approver_id == approver_id {
            info!(blog_id = %blog_id, version_id = %version_id, "Approval already current, returning existing row");
            return Ok(current);
        }
    }

    let id = uuid_utils::generate();
    let approved_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO approval_states (id, blog_id, approved_version_id, approver_id, approved_at, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(blog_id.to_string())
    .bind(version_id.to_string())
    .bind(approver_id.to_string())
    .bind(time::to_db(approved_at))
    .bind(notes)
    .execute(pool)
    .await?;

    info!(blog_id = %blog_id, version_id = %version_id, approver_id = %approver_id, "Approval recorded");

    Ok(ApprovalState {
        id,
        blog_id,
        approved_version_id: version_id,
        approver_id,
        approved_at,
        revoked_at: None,
        revoked_by: None,
        revocation_reason: None,
        notes: notes.map(str::to_string),
    })
}

/// Revoke the current approval by inserting a companion row pointing at the
/// previously approved version. Fails with `invalid_state` when the blog has
/// no current approval.
pub async fn revoke_approval(
    pool: &SqlitePool,
    blog_id: Uuid,
    revoked_by: Uuid,
    reason: &str,
) -> Result<ApprovalState> {
    if reason.trim().is_empty() {
        return Err(Error::Validation(
            "revocation reason must not be empty".to_string(),
        ));
    }

    let current = current_approval(pool, blog_id).await?.ok_or_else(|| {
        Error::InvalidState(format!("blog {blog_id} has no current approval to revoke"))
    })?;

    let id = uuid_utils::generate();
    let now = time::now();

    sqlx::query(
        r#"
        INSERT INTO approval_states (
            id, blog_id, approved_version_id, approver_id, approved_at,
            revoked_at, revoked_by, revocation_reason
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(blog_id.to_string())
    .bind(current.approved_version_id.to_string())
    .bind(current.approver_id.to_string())
    .bind(time::to_db(now))
    .bind(time::to_db(now))
    .bind(revoked_by.to_string())
    .bind(reason)
    .execute(pool)
    .await?;

    warn!(blog_id = %blog_id, revoked_by = %revoked_by, reason, "Approval revoked");

    Ok(ApprovalState {
        id,
        blog_id,
        approved_version_id: current.approved_version_id,
        approver_id: current.approver_id,
        approved_at: now,
        revoked_at: Some(now),
        revoked_by: Some(revoked_by),
        revocation_reason: Some(reason.to_string()),
        notes: None,
    })
}

/// The blog's current approval: newest row by (approved_at, id); a revoked
/// newest row means no current approval.
pub async fn current_approval(
    pool: &SqlitePool,
    blog_id: Uuid,
) -> Result<Option<ApprovalState>> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_id, approved_version_id, approver_id, approved_at,
               revoked_at, revoked_by, revocation_reason, notes
        FROM approval_states
        WHERE blog_id = ?
        ORDER BY approved_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let approval = map_approval(&row)?;
            if approval.revoked_at.is_some() {
                Ok(None)
            } else {
                Ok(Some(approval))
            }
        }
        None => Ok(None),
    }
}

/// Append an approval-attempt audit row with its final result.
pub async fn log_attempt(
    pool: &SqlitePool,
    blog_id: Uuid,
    attempted_by: Uuid,
    is_human_snapshot: bool,
    result: AttemptResult,
    failure_reason: Option<&str>,
) -> Result<ApprovalAttempt> {
    let id = uuid_utils::generate();
    let attempted_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO approval_attempts (
            id, blog_id, attempted_by, is_human_snapshot, result, attempted_at, failure_reason
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(blog_id.to_string())
    .bind(attempted_by.to_string())
    .bind(is_human_snapshot)
    .bind(result.as_str())
    .bind(time::to_db(attempted_at))
    .bind(failure_reason)
    .execute(pool)
    .await?;

    Ok(ApprovalAttempt {
        id,
        blog_id,
        attempted_by,
        is_human_snapshot,
        result,
        attempted_at,
        failure_reason: failure_reason.map(str::to_string),
    })
}

/// Attempts for a blog, newest first.
pub async fn list_attempts(pool: &SqlitePool, blog_id: Uuid) -> Result<Vec<ApprovalAttempt>> {
    let rows = sqlx::query(
        r#"
        SELECT id, blog_id, attempted_by, is_human_snapshot, result, attempted_at, failure_reason
        FROM approval_attempts
        WHERE blog_id = ?
        ORDER BY attempted_at DESC, id DESC
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id_str: String = row.get("id");
            let blog_str: String = row.get("blog_id");
            let by_str: String = row.get("attempted_by");
            let result_str: String = row.get("result");
            let at_str: String = row.get("attempted_at");
            Ok(ApprovalAttempt {
                id: parse_uuid(&id_str)?,
                blog_id: parse_uuid(&blog_str)?,
                attempted_by: parse_uuid(&by_str)?,
                is_human_snapshot: row.get("is_human_snapshot"),
                result: AttemptResult::parse(&result_str).ok_or_else(|| {
                    Error::Internal(format!("unknown attempt result '{result_str}'"))
                })?,
                attempted_at: parse_ts(&at_str)?,
                failure_reason: row.get("failure_reason"),
            })
        })
        .collect()
}

/// Count a reviewer's fast approvals (notes = 'fast approval') in the last
/// `window_seconds`. Feeds the co-signature gate.
pub async fn count_recent_fast_approvals(
    pool: &SqlitePool,
    approver_id: Uuid,
    window_seconds: i64,
) -> Result<i64> {
    let cutoff = time::now() - chrono::Duration::seconds(window_seconds);
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM approval_states
        WHERE approver_id = ?
          AND notes = 'fast approval'
          AND revoked_at IS NULL
          AND approved_at > ?
        "#,
    )
    .bind(approver_id.to_string())
    .bind(time::to_db(cutoff))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

fn map_approval(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalState> {
    let id_str: String = row.get("id");
    let blog_str: String = row.get("blog_id");
    let version_str: String = row.get("approved_version_id");
    let approver_str: String = row.get("approver_id");
    let approved_at_str: String = row.get("approved_at");
    let revoked_at_str: Option<String> = row.get("revoked_at");
    let revoked_by_str: Option<String> = row.get("revoked_by");

    Ok(ApprovalState {
        id: parse_uuid(&id_str)?,
        blog_id: parse_uuid(&blog_str)?,
        approved_version_id: parse_uuid(&version_str)?,
        approver_id: parse_uuid(&approver_str)?,
        approved_at: parse_ts(&approved_at_str)?,
        revoked_at: parse_opt_ts(revoked_at_str)?,
        revoked_by: parse_opt_uuid(revoked_by_str)?,
        revocation_reason: row.get("revocation_reason"),
        notes: row.get("notes"),
    })
}
