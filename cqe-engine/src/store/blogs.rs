//! Blog queries
//!
//! A blog is a stable content identity. Its name is immutable after
//! creation (trigger-enforced).

use super::{parse_ts, parse_uuid};
use cqe_common::db::models::Blog;
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub async fn create_blog(
    pool: &SqlitePool,
    name: &str,
    created_by: Uuid,
    project_id: Option<&str>,
) -> Result<Blog> {
    if name.trim().is_empty() {
        return Err(Error::Validation("blog name must not be empty".to_string()));
    }

    let id = uuid_utils::generate();
    let created_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO blogs (id, name, project_id, created_by, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(project_id)
    .bind(created_by.to_string())
    .bind(time::to_db(created_at))
    .execute(pool)
    .await?;

    info!(blog_id = %id, name, "Blog created");

    Ok(Blog {
        id,
        name: name.to_string(),
        project_id: project_id.map(str::to_string),
        created_by,
        created_at,
    })
}

pub async fn get_blog(pool: &SqlitePool, id: Uuid) -> Result<Blog> {
    let row = sqlx::query(
        "SELECT id, name, project_id, created_by, created_at FROM blogs WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("blog {id} does not exist")))?;

    let id_str: String = row.get("id");
    let created_by_str: String = row.get("created_by");
    let created_at_str: String = row.get("created_at");

    Ok(Blog {
        id: parse_uuid(&id_str)?,
        name: row.get("name"),
        project_id: row.get("project_id"),
        created_by: parse_uuid(&created_by_str)?,
        created_at: parse_ts(&created_at_str)?,
    })
}
