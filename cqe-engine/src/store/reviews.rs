//! Review audit and state-row queries
//!
//! human_review_actions is append-only. review_states is the per-version
//! state machine row; transitions are validated by the review service and
//! only move forward.

use super::{parse_opt_ts, parse_ts, parse_uuid};
use cqe_common::db::models::{
    HumanReviewAction, ReviewActionKind, ReviewState, VersionReviewState,
};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Arguments for logging a review action
#[derive(Debug, Clone)]
pub struct LogReviewAction<'a> {
    pub blog_version_id: Uuid,
    pub reviewer_id: Uuid,
    pub action: ReviewActionKind,
    pub comments: Option<&'a str>,
    pub is_override: bool,
    pub justification: Option<&'a str>,
    pub risk_acceptance_note: Option<&'a str>,
}

pub async fn log_review_action(
    pool: &SqlitePool,
    request: LogReviewAction<'_>,
) -> Result<HumanReviewAction> {
    if request.is_override
        && (request.justification.is_none() || request.risk_acceptance_note.is_none())
    {
        return Err(Error::Validation(
            "override actions require justification and risk acceptance note".to_string(),
        ));
    }

    let id = uuid_utils::generate();
    let performed_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO human_review_actions (
            id, blog_version_id, reviewer_id, action, comments,
            is_override, justification, risk_acceptance_note, performed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(request.blog_version_id.to_string())
    .bind(request.reviewer_id.to_string())
    .bind(request.action.as_str())
    .bind(request.comments)
    .bind(request.is_override)
    .bind(request.justification)
    .bind(request.risk_acceptance_note)
    .bind(time::to_db(performed_at))
    .execute(pool)
    .await?;

    Ok(HumanReviewAction {
        id,
        blog_version_id: request.blog_version_id,
        reviewer_id: request.reviewer_id,
        action: request.action,
        comments: request.comments.map(str::to_string),
        is_override: request.is_override,
        justification: request.justification.map(str::to_string),
        risk_acceptance_note: request.risk_acceptance_note.map(str::to_string),
        performed_at,
    })
}

/// Actions for a version, oldest first, optionally filtered by kind.
pub async fn list_review_actions(
    pool: &SqlitePool,
    version_id: Uuid,
    action: Option<ReviewActionKind>,
) -> Result<Vec<HumanReviewAction>> {
    let rows = match action {
        Some(kind) => {
            sqlx::query(
                r#"
                SELECT id, blog_version_id, reviewer_id, action, comments,
                       is_override, justification, risk_acceptance_note, performed_at
                FROM human_review_actions
                WHERE blog_version_id = ? AND action = ?
                ORDER BY performed_at ASC, id ASC
                "#,
            )
            .bind(version_id.to_string())
            .bind(kind.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, blog_version_id, reviewer_id, action, comments,
                       is_override, justification, risk_acceptance_note, performed_at
                FROM human_review_actions
                WHERE blog_version_id = ?
                ORDER BY performed_at ASC, id ASC
                "#,
            )
            .bind(version_id.to_string())
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(map_action).collect()
}

/// Count submit-for-review events across all versions of a blog.
pub async fn count_review_cycles(pool: &SqlitePool, blog_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM human_review_actions a
        JOIN blog_versions v ON v.id = a.blog_version_id
        WHERE v.blog_id = ? AND a.action = 'SUBMIT_FOR_REVIEW'
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Count REJECT actions by one reviewer on a blog within a window.
pub async fn count_recent_rejections(
    pool: &SqlitePool,
    blog_id: Uuid,
    reviewer_id: Uuid,
    window_seconds: i64,
) -> Result<i64> {
    let cutoff = time::now() - chrono::Duration::seconds(window_seconds);
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM human_review_actions a
        JOIN blog_versions v ON v.id = a.blog_version_id
        WHERE v.blog_id = ? AND a.reviewer_id = ? AND a.action = 'REJECT'
          AND a.performed_at > ?
        "#,
    )
    .bind(blog_id.to_string())
    .bind(reviewer_id.to_string())
    .bind(time::to_db(cutoff))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

// -- review state rows ----------------------------------------------------

pub async fn get_review_state(pool: &SqlitePool, version_id: Uuid) -> Result<VersionReviewState> {
    let row = sqlx::query(
        r#"
        SELECT version_id, blog_id, state, review_started_at,
               review_duration_seconds, updated_at
        FROM review_states
        WHERE version_id = ?
        "#,
    )
    .bind(version_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("version {version_id} has no review state")))?;

    map_state(&row)
}

/// Persist a state transition. Forward-only validation happens in the review
/// service; this just writes the row.
pub async fn write_review_state(
    pool: &SqlitePool,
    version_id: Uuid,
    state: ReviewState,
    review_started_at: Option<chrono::DateTime<chrono::Utc>>,
    review_duration_seconds: Option<i64>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE review_states
        SET state = ?,
            review_started_at = COALESCE(?, review_started_at),
            review_duration_seconds = COALESCE(?, review_duration_seconds),
            updated_at = ?
        WHERE version_id = ?
        "#,
    )
    .bind(state.as_str())
    .bind(review_started_at.map(cqe_common::time::to_db))
    .bind(review_duration_seconds)
    .bind(time::to_db(time::now()))
    .bind(version_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Versions sitting in IN_REVIEW whose review started before the cutoff.
pub async fn list_stale_in_review(
    pool: &SqlitePool,
    cutoff: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<VersionReviewState>> {
    let rows = sqlx::query(
        r#"
        SELECT version_id, blog_id, state, review_started_at,
               review_duration_seconds, updated_at
        FROM review_states
        WHERE state = 'in_review' AND review_started_at < ?
        "#,
    )
    .bind(time::to_db(cutoff))
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_state).collect()
}

fn map_state(row: &sqlx::sqlite::SqliteRow) -> Result<VersionReviewState> {
    let version_str: String = row.get("version_id");
    let blog_str: String = row.get("blog_id");
    let state_str: String = row.get("state");
    let started_str: Option<String> = row.get("review_started_at");
    let updated_str: String = row.get("updated_at");

    Ok(VersionReviewState {
        version_id: parse_uuid(&version_str)?,
        blog_id: parse_uuid(&blog_str)?,
        state: ReviewState::parse(&state_str)
            .ok_or_else(|| Error::Internal(format!("unknown review state '{state_str}'")))?,
        review_started_at: parse_opt_ts(started_str)?,
        review_duration_seconds: row.get("review_duration_seconds"),
        updated_at: parse_ts(&updated_str)?,
    })
}

fn map_action(row: &sqlx::sqlite::SqliteRow) -> Result<HumanReviewAction> {
    let id_str: String = row.get("id");
    let version_str: String = row.get("blog_version_id");
    let reviewer_str: String = row.get("reviewer_id");
    let action_str: String = row.get("action");
    let performed_str: String = row.get("performed_at");

    Ok(HumanReviewAction {
        id: parse_uuid(&id_str)?,
        blog_version_id: parse_uuid(&version_str)?,
        reviewer_id: parse_uuid(&reviewer_str)?,
        action: ReviewActionKind::parse(&action_str)
            .ok_or_else(|| Error::Internal(format!("unknown review action '{action_str}'")))?,
        comments: row.get("comments"),
        is_override: row.get("is_override"),
        justification: row.get("justification"),
        risk_acceptance_note: row.get("risk_acceptance_note"),
        performed_at: parse_ts(&performed_str)?,
    })
}
