//! Evaluation-run and score-row queries
//!
//! The pipeline exclusively owns these tables. Score inserts are
//! check-then-insert so a retried task never double-writes; the UNIQUE
//! constraint backstops the race between check and insert.

use crate::store::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid};
use cqe_common::db::models::{AeoScore, DetectorScore, EvaluationRun, RunStatus};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn create_run(
    pool: &SqlitePool,
    version_id: Uuid,
    triggered_by: Option<Uuid>,
    model_config: serde_json::Value,
) -> Result<EvaluationRun> {
    let id = uuid_utils::generate();
    let run_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO evaluation_runs (id, blog_version_id, run_at, triggered_by, model_config, status)
        VALUES (?, ?, ?, ?, ?, 'processing')
        "#,
    )
    .bind(id.to_string())
    .bind(version_id.to_string())
    .bind(time::to_db(run_at))
    .bind(triggered_by.map(|t| t.to_string()))
    .bind(model_config.to_string())
    .execute(pool)
    .await?;

    Ok(EvaluationRun {
        id,
        blog_version_id: version_id,
        run_at,
        triggered_by,
        model_config,
        status: RunStatus::Processing,
        completed_at: None,
    })
}

pub async fn get_run(pool: &SqlitePool, run_id: Uuid) -> Result<EvaluationRun> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_version_id, run_at, triggered_by, model_config, status, completed_at
        FROM evaluation_runs
        WHERE id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("evaluation run {run_id} does not exist")))?;

    map_run(&row)
}

/// An unfinished run for this version, if any (state-based deduplication).
pub async fn find_processing_run(
    pool: &SqlitePool,
    version_id: Uuid,
) -> Result<Option<EvaluationRun>> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_version_id, run_at, triggered_by, model_config, status, completed_at
        FROM evaluation_runs
        WHERE blog_version_id = ? AND status = 'processing'
        ORDER BY run_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(version_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_run).transpose()
}

/// Finalize a run exactly once. The status guard makes the transition and
/// the completed_at write atomic; a duplicate finalize is a no-op.
pub async fn finalize_run(pool: &SqlitePool, run_id: Uuid, status: RunStatus) -> Result<bool> {
    if !status.is_terminal() {
        return Err(Error::Internal(
            "finalize_run requires a terminal status".to_string(),
        ));
    }

    let updated = sqlx::query(
        r#"
        UPDATE evaluation_runs
        SET status = ?, completed_at = ?
        WHERE id = ? AND status = 'processing'
        "#,
    )
    .bind(status.as_str())
    .bind(time::to_db(time::now()))
    .bind(run_id.to_string())
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// The latest finished run for any version of the blog, strictly before the
/// given run. Ties resolve by run_at then id.
pub async fn latest_finished_run_before(
    pool: &SqlitePool,
    blog_id: Uuid,
    before: &EvaluationRun,
) -> Result<Option<EvaluationRun>> {
    let row = sqlx::query(
        r#"
        SELECT r.id, r.blog_version_id, r.run_at, r.triggered_by, r.model_config,
               r.status, r.completed_at
        FROM evaluation_runs r
        JOIN blog_versions v ON v.id = r.blog_version_id
        WHERE v.blog_id = ?
          AND r.id != ?
          AND r.status IN ('completed', 'partial_failure')
          AND (r.run_at < ? OR (r.run_at = ? AND r.id < ?))
        ORDER BY r.run_at DESC, r.id DESC
        LIMIT 1
        "#,
    )
    .bind(blog_id.to_string())
    .bind(before.id.to_string())
    .bind(time::to_db(before.run_at))
    .bind(time::to_db(before.run_at))
    .bind(before.id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_run).transpose()
}

/// The latest completed run for one specific version (trigger input).
pub async fn latest_completed_run_for_version(
    pool: &SqlitePool,
    version_id: Uuid,
) -> Result<Option<EvaluationRun>> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_version_id, run_at, triggered_by, model_config, status, completed_at
        FROM evaluation_runs
        WHERE blog_version_id = ? AND status IN ('completed', 'partial_failure')
        ORDER BY run_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(version_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_run).transpose()
}

/// Insert a detector score unless one already exists for (run, provider).
/// Returns false when the row was already present.
pub async fn insert_detector_score(
    pool: &SqlitePool,
    run_id: Uuid,
    provider: &str,
    score: f64,
    details: &serde_json::Value,
) -> Result<bool> {
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM ai_detector_scores WHERE run_id = ? AND provider = ?",
    )
    .bind(run_id.to_string())
    .bind(provider)
    .fetch_optional(pool)
    .await?;
    if existing.is_some() {
        return Ok(false);
    }

    let insert = sqlx::query(
        r#"
        INSERT INTO ai_detector_scores (id, run_id, provider, score, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid_utils::generate().to_string())
    .bind(run_id.to_string())
    .bind(provider)
    .bind(score)
    .bind(details.to_string())
    .execute(pool)
    .await;

    match insert {
        Ok(_) => Ok(true),
        // Lost the race to another attempt: the row exists, which is the goal.
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

/// Insert an AEO score unless one already exists for (run, query intent).
pub async fn insert_aeo_score(
    pool: &SqlitePool,
    run_id: Uuid,
    query_intent: &str,
    score: f64,
    rationale: &str,
    details: &serde_json::Value,
) -> Result<bool> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT id FROM aeo_scores WHERE run_id = ? AND query_intent = ?")
            .bind(run_id.to_string())
            .bind(query_intent)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(false);
    }

    let insert = sqlx::query(
        r#"
        INSERT INTO aeo_scores (id, run_id, query_intent, score, rationale, details)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid_utils::generate().to_string())
    .bind(run_id.to_string())
    .bind(query_intent)
    .bind(score)
    .bind(rationale)
    .bind(details.to_string())
    .execute(pool)
    .await;

    match insert {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_detector_scores(pool: &SqlitePool, run_id: Uuid) -> Result<Vec<DetectorScore>> {
    let rows = sqlx::query(
        r#"
        SELECT id, run_id, provider, score, details
        FROM ai_detector_scores
        WHERE run_id = ?
        ORDER BY provider ASC
        "#,
    )
    .bind(run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id_str: String = row.get("id");
            let run_str: String = row.get("run_id");
            let details_str: String = row.get("details");
            Ok(DetectorScore {
                id: parse_uuid(&id_str)?,
                run_id: parse_uuid(&run_str)?,
                provider: row.get("provider"),
                score: row.get("score"),
                details: serde_json::from_str(&details_str)
                    .map_err(|e| Error::Internal(format!("malformed detector details: {e}")))?,
            })
        })
        .collect()
}

pub async fn list_aeo_scores(pool: &SqlitePool, run_id: Uuid) -> Result<Vec<AeoScore>> {
    let rows = sqlx::query(
        r#"
        SELECT id, run_id, query_intent, score, rationale, details
        FROM aeo_scores
        WHERE run_id = ?
        ORDER BY query_intent ASC
        "#,
    )
    .bind(run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id_str: String = row.get("id");
            let run_str: String = row.get("run_id");
            let details_str: String = row.get("details");
            Ok(AeoScore {
                id: parse_uuid(&id_str)?,
                run_id: parse_uuid(&run_str)?,
                query_intent: row.get("query_intent"),
                score: row.get("score"),
                rationale: row.get("rationale"),
                details: serde_json::from_str(&details_str)
                    .map_err(|e| Error::Internal(format!("malformed AEO details: {e}")))?,
            })
        })
        .collect()
}

fn map_run(row: &sqlx::sqlite::SqliteRow) -> Result<EvaluationRun> {
    let id_str: String = row.get("id");
    let version_str: String = row.get("blog_version_id");
    let run_at_str: String = row.get("run_at");
    let triggered_str: Option<String> = row.get("triggered_by");
    let config_str: String = row.get("model_config");
    let status_str: String = row.get("status");
    let completed_str: Option<String> = row.get("completed_at");

    Ok(EvaluationRun {
        id: parse_uuid(&id_str)?,
        blog_version_id: parse_uuid(&version_str)?,
        run_at: parse_ts(&run_at_str)?,
        triggered_by: parse_opt_uuid(triggered_str)?,
        model_config: serde_json::from_str(&config_str)
            .map_err(|e| Error::Internal(format!("malformed model_config: {e}")))?,
        status: RunStatus::parse(&status_str)
            .ok_or_else(|| Error::Internal(format!("unknown run status '{status_str}'")))?,
        completed_at: parse_opt_ts(completed_str)?,
    })
}
