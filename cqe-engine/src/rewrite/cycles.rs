//! Rewrite-cycle row queries
//!
//! The orchestrator exclusively owns rewrite_cycles. Prompt, trigger data,
//! and parent snapshots are write-once; completion links the child and
//! records the trend exactly once.

use crate::store::{parse_opt_uuid, parse_ts, parse_uuid};
use cqe_common::db::models::{RewriteCycle, RewriteStatus, TrendOutcome};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Arguments for inserting a cycle row
#[derive(Debug, Clone)]
pub struct NewCycle {
    pub parent_version_id: Uuid,
    pub cycle_number: i64,
    pub trigger_reasons: Vec<String>,
    pub trigger_data: serde_json::Value,
    pub rewrite_prompt: String,
    pub parent_aeo_total: Option<f64>,
    pub parent_ai_likeness_total: Option<f64>,
    /// pending for live cycles, terminal for recorded refusals
    pub status: RewriteStatus,
    pub stop_reason: Option<String>,
}

pub async fn insert_cycle(pool: &SqlitePool, new: NewCycle) -> Result<RewriteCycle> {
    let id = uuid_utils::generate();
    let created_at = time::now();
    let reasons_json = serde_json::to_string(&new.trigger_reasons)
        .map_err(|e| Error::Internal(format!("trigger reasons not serializable: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO rewrite_cycles (
            id, parent_version_id, cycle_number, trigger_reasons, trigger_data,
            rewrite_prompt, parent_aeo_total, parent_ai_likeness_total,
            rewrite_status, stop_reason, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(new.parent_version_id.to_string())
    .bind(new.cycle_number)
    .bind(&reasons_json)
    .bind(new.trigger_data.to_string())
    .bind(&new.rewrite_prompt)
    .bind(new.parent_aeo_total)
    .bind(new.parent_ai_likeness_total)
    .bind(new.status.as_str())
    .bind(new.stop_reason.as_deref())
    .execute(pool)
    .await
    .map_err(|e| {
        Error::from(e).into_conflict("a cycle with this number already exists for the parent")
    })?;

    Ok(RewriteCycle {
        id,
        parent_version_id: new.parent_version_id,
        child_version_id: None,
        cycle_number: new.cycle_number,
        trigger_reasons: new.trigger_reasons,
        trigger_data: new.trigger_data,
        rewrite_prompt: new.rewrite_prompt,
        parent_aeo_total: new.parent_aeo_total,
        parent_ai_likeness_total: new.parent_ai_likeness_total,
        child_aeo_total: None,
        child_ai_likeness_total: None,
        trend_outcome: None,
        trend_code: None,
        rewrite_status: new.status,
        stop_reason: new.stop_reason,
        created_at,
    })
}

/// 1 + the highest existing cycle number for a parent version.
pub async fn next_cycle_number(pool: &SqlitePool, parent_version_id: Uuid) -> Result<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(cycle_number) FROM rewrite_cycles WHERE parent_version_id = ?")
            .bind(parent_version_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(max.unwrap_or(0) + 1)
}

/// Total rewrite cycles recorded against any version of a blog.
pub async fn count_cycles_for_blog(pool: &SqlitePool, blog_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM rewrite_cycles c
        JOIN blog_versions v ON v.id = c.parent_version_id
        WHERE v.blog_id = ?
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Cycles for a blog ordered oldest first (loop-breaking history).
pub async fn list_cycles_for_blog(pool: &SqlitePool, blog_id: Uuid) -> Result<Vec<RewriteCycle>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.parent_version_id, c.child_version_id, c.cycle_number,
               c.trigger_reasons, c.trigger_data, c.rewrite_prompt,
               c.parent_aeo_total, c.parent_ai_likeness_total,
               c.child_aeo_total, c.child_ai_likeness_total,
               c.trend_outcome, c.trend_code, c.rewrite_status, c.stop_reason,
               c.created_at
        FROM rewrite_cycles c
        JOIN blog_versions v ON v.id = c.parent_version_id
        WHERE v.blog_id = ?
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_cycle).collect()
}

pub async fn get_cycle(pool: &SqlitePool, cycle_id: Uuid) -> Result<RewriteCycle> {
    let row = sqlx::query(
        r#"
        SELECT id, parent_version_id, child_version_id, cycle_number,
               trigger_reasons, trigger_data, rewrite_prompt,
               parent_aeo_total, parent_ai_likeness_total,
               child_aeo_total, child_ai_likeness_total,
               trend_outcome, trend_code, rewrite_status, stop_reason, created_at
        FROM rewrite_cycles
        WHERE id = ?
        "#,
    )
    .bind(cycle_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("rewrite cycle {cycle_id} does not exist")))?;

    map_cycle(&row)
}

/// Complete a pending cycle: link the child, snapshot its scores, and record
/// the trend.
pub async fn complete_cycle(
    pool: &SqlitePool,
    cycle_id: Uuid,
    child_version_id: Uuid,
    child_aeo_total: Option<f64>,
    child_ai_likeness_total: Option<f64>,
    trend: Option<TrendOutcome>,
) -> Result<RewriteCycle> {
    let updated = sqlx::query(
        r#"
        UPDATE rewrite_cycles
        SET child_version_id = ?, child_aeo_total = ?, child_ai_likeness_total = ?,
            trend_outcome = ?, trend_code = ?, rewrite_status = 'completed'
        WHERE id = ? AND rewrite_status = 'pending'
        "#,
    )
    .bind(child_version_id.to_string())
    .bind(child_aeo_total)
    .bind(child_ai_likeness_total)
    .bind(trend.map(|t| t.as_str()))
    .bind(trend.map(|t| t.code()))
    .bind(cycle_id.to_string())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::InvalidState(format!(
            "rewrite cycle {cycle_id} is not pending"
        )));
    }

    get_cycle(pool, cycle_id).await
}

/// Mark a pending cycle terminal with a stop reason; optionally link a child
/// that was appended before the stop.
pub async fn terminate_cycle(
    pool: &SqlitePool,
    cycle_id: Uuid,
    stop_reason: &str,
    child_version_id: Option<Uuid>,
) -> Result<RewriteCycle> {
    let updated = sqlx::query(
        r#"
        UPDATE rewrite_cycles
        SET rewrite_status = 'terminal', stop_reason = ?, child_version_id = ?
        WHERE id = ? AND rewrite_status = 'pending'
        "#,
    )
    .bind(stop_reason)
    .bind(child_version_id.map(|v| v.to_string()))
    .bind(cycle_id.to_string())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::InvalidState(format!(
            "rewrite cycle {cycle_id} is not pending"
        )));
    }

    get_cycle(pool, cycle_id).await
}

fn map_cycle(row: &sqlx::sqlite::SqliteRow) -> Result<RewriteCycle> {
    let id_str: String = row.get("id");
    let parent_str: String = row.get("parent_version_id");
    let child_str: Option<String> = row.get("child_version_id");
    let reasons_str: String = row.get("trigger_reasons");
    let data_str: String = row.get("trigger_data");
    let trend_str: Option<String> = row.get("trend_outcome");
    let status_str: String = row.get("rewrite_status");
    let created_str: String = row.get("created_at");

    Ok(RewriteCycle {
        id: parse_uuid(&id_str)?,
        parent_version_id: parse_uuid(&parent_str)?,
        child_version_id: parse_opt_uuid(child_str)?,
        cycle_number: row.get("cycle_number"),
        trigger_reasons: serde_json::from_str(&reasons_str)
            .map_err(|e| Error::Internal(format!("malformed trigger reasons: {e}")))?,
        trigger_data: serde_json::from_str(&data_str)
            .map_err(|e| Error::Internal(format!("malformed trigger data: {e}")))?,
        rewrite_prompt: row.get("rewrite_prompt"),
        parent_aeo_total: row.get("parent_aeo_total"),
        parent_ai_likeness_total: row.get("parent_ai_likeness_total"),
        child_aeo_total: row.get("child_aeo_total"),
        child_ai_likeness_total: row.get("child_ai_likeness_total"),
        trend_outcome: trend_str
            .map(|t| {
                TrendOutcome::parse(&t)
                    .ok_or_else(|| Error::Internal(format!("unknown trend outcome '{t}'")))
            })
            .transpose()?,
        trend_code: row.get("trend_code"),
        rewrite_status: RewriteStatus::parse(&status_str)
            .ok_or_else(|| Error::Internal(format!("unknown rewrite status '{status_str}'")))?,
        stop_reason: row.get("stop_reason"),
        created_at: parse_ts(&created_str)?,
    })
}
