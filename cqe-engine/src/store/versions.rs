//! Version queries
//!
//! Versions are write-once snapshots forming a per-blog lineage DAG. The
//! version number is computed as 1 + the blog's current maximum; a losing
//! race surfaces as `conflict` and the caller retries with refreshed state.

use super::{parse_opt_uuid, parse_source, parse_ts, parse_uuid};
use cqe_common::db::models::{Version, VersionSource};
use cqe_common::{time, uuid_utils, Error, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Arguments for appending a version
#[derive(Debug, Clone)]
pub struct AppendVersion<'a> {
    pub blog_id: Uuid,
    pub content: &'a str,
    pub source: VersionSource,
    pub parent_version_id: Option<Uuid>,
    pub change_reason: Option<&'a str>,
    pub source_rewrite_cycle_id: Option<Uuid>,
    pub created_by: Uuid,
}

/// SHA-256 over the content, lower hex
pub fn content_hash(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    format!("{:x}", hash)
}

pub async fn append_version(
    pool: &SqlitePool,
    request: AppendVersion<'_>,
) -> Result<Version> {
    if request.source == VersionSource::AiRewrite && request.source_rewrite_cycle_id.is_none() {
        return Err(Error::Validation(
            "ai_rewrite versions require a source rewrite cycle id".to_string(),
        ));
    }

    if let Some(parent_id) = request.parent_version_id {
        let parent = get_version(pool, parent_id).await.map_err(|e| match e {
            Error::NotFound(msg) => Error::Validation(msg),
            other => other,
        })?;
        if parent.blog_id != request.blog_id {
            return Err(Error::Validation(format!(
                "parent version {parent_id} belongs to a different blog"
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let max_existing: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version_number) FROM blog_versions WHERE blog_id = ?")
            .bind(request.blog_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
    let version_number = max_existing.unwrap_or(0) + 1;

    if request.parent_version_id.is_none() && version_number != 1 {
        return Err(Error::Validation(
            "only the root version may omit a parent".to_string(),
        ));
    }

    let id = uuid_utils::generate();
    let created_at = time::now();
    let hash = content_hash(request.content);

    sqlx::query(
        r#"
        INSERT INTO blog_versions (
            id, blog_id, parent_version_id, content, content_hash,
            version_number, source, source_rewrite_cycle_id, change_reason,
            created_by, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(request.blog_id.to_string())
    .bind(request.parent_version_id.map(|p| p.to_string()))
    .bind(request.content)
    .bind(&hash)
    .bind(version_number)
    .bind(request.source.as_str())
    .bind(request.source_rewrite_cycle_id.map(|c| c.to_string()))
    .bind(request.change_reason)
    .bind(request.created_by.to_string())
    .bind(time::to_db(created_at))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        Error::from(e).into_conflict("concurrent version append, retry with refreshed state")
    })?;

    // Every version starts its review life in DRAFT with a fresh timer.
    sqlx::query(
        r#"
        INSERT INTO review_states (version_id, blog_id, state, updated_at)
        VALUES (?, ?, 'draft', ?)
        "#,
    )
    .bind(id.to_string())
    .bind(request.blog_id.to_string())
    .bind(time::to_db(created_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        blog_id = %request.blog_id,
        version_id = %id,
        version_number,
        source = request.source.as_str(),
        "Version appended"
    );

    Ok(Version {
        id,
        blog_id: request.blog_id,
        parent_version_id: request.parent_version_id,
        content: request.content.to_string(),
        content_hash: hash,
        version_number,
        source: request.source,
        source_rewrite_cycle_id: request.source_rewrite_cycle_id,
        change_reason: request.change_reason.map(str::to_string),
        created_by: request.created_by,
        created_at,
    })
}

pub async fn get_version(pool: &SqlitePool, id: Uuid) -> Result<Version> {
    let row = sqlx::query(
        r#"
        SELECT id, blog_id, parent_version_id, content, content_hash,
               version_number, source, source_rewrite_cycle_id, change_reason,
               created_by, created_at
        FROM blog_versions
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("version {id} does not exist")))?;

    map_version(&row)
}

/// Versions of a blog ordered by (version_number, created_at) ascending
pub async fn list_versions(pool: &SqlitePool, blog_id: Uuid) -> Result<Vec<Version>> {
    let rows = sqlx::query(
        r#"
        SELECT id, blog_id, parent_version_id, content, content_hash,
               version_number, source, source_rewrite_cycle_id, change_reason,
               created_by, created_at
        FROM blog_versions
        WHERE blog_id = ?
        ORDER BY version_number ASC, created_at ASC
        "#,
    )
    .bind(blog_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_version).collect()
}

fn map_version(row: &sqlx::sqlite::SqliteRow) -> Result<Version> {
    let id_str: String = row.get("id");
    let blog_id_str: String = row.get("blog_id");
    let parent_str: Option<String> = row.get("parent_version_id");
    let source_str: String = row.get("source");
    let cycle_str: Option<String> = row.get("source_rewrite_cycle_id");
    let created_by_str: String = row.get("created_by");
    let created_at_str: String = row.get("created_at");

    Ok(Version {
        id: parse_uuid(&id_str)?,
        blog_id: parse_uuid(&blog_id_str)?,
        parent_version_id: parse_opt_uuid(parent_str)?,
        content: row.get("content"),
        content_hash: row.get("content_hash"),
        version_number: row.get("version_number"),
        source: parse_source(&source_str)?,
        source_rewrite_cycle_id: parse_opt_uuid(cycle_str)?,
        change_reason: row.get("change_reason"),
        created_by: parse_uuid(&created_by_str)?,
        created_at: parse_ts(&created_at_str)?,
    })
}
