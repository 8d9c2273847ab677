//! Actor registry queries
//!
//! Actors are created once and never deleted. The only mutable field is
//! `is_human`, and only an admin may toggle it.

use super::{parse_ts, parse_uuid};
use cqe_common::db::models::{Actor, ActorRole};
use cqe_common::{time, uuid_utils, Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Create an actor. Fails with `validation` for a system actor marked human
/// (also rejected by the schema CHECK) and with `conflict` on a duplicate
/// email.
pub async fn create_actor(
    pool: &SqlitePool,
    email: &str,
    role: ActorRole,
    is_human: bool,
) -> Result<Actor> {
    if email.trim().is_empty() {
        return Err(Error::Validation("actor email must not be empty".to_string()));
    }
    if role == ActorRole::System && is_human {
        return Err(Error::Validation(
            "system actors cannot be marked human".to_string(),
        ));
    }

    let id = uuid_utils::generate();
    let created_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO actors (id, email, role, is_human, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(email)
    .bind(role.as_str())
    .bind(is_human)
    .bind(time::to_db(created_at))
    .execute(pool)
    .await
    .map_err(|e| Error::from(e).into_conflict("actor email already registered"))?;

    info!(actor_id = %id, email, role = role.as_str(), "Actor created");

    Ok(Actor {
        id,
        email: email.to_string(),
        role,
        is_human,
        created_at,
    })
}

pub async fn get_actor(pool: &SqlitePool, id: Uuid) -> Result<Actor> {
    let row = sqlx::query(
        "SELECT id, email, role, is_human, created_at FROM actors WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("actor {id} does not exist")))?;

    map_actor(&row)
}

/// Toggle `is_human`. Only admins may do this; the change is logged.
pub async fn set_is_human(
    pool: &SqlitePool,
    actor_id: Uuid,
    is_human: bool,
    changed_by: Uuid,
) -> Result<Actor> {
    let admin = get_actor(pool, changed_by).await?;
    if admin.role != ActorRole::Admin {
        return Err(Error::Forbidden(
            "only admins may change the is_human flag".to_string(),
        ));
    }

    let target = get_actor(pool, actor_id).await?;
    if target.role == ActorRole::System && is_human {
        return Err(Error::Validation(
            "system actors cannot be marked human".to_string(),
        ));
    }

    sqlx::query("UPDATE actors SET is_human = ? WHERE id = ?")
        .bind(is_human)
        .bind(actor_id.to_string())
        .execute(pool)
        .await?;

    info!(
        actor_id = %actor_id,
        is_human,
        changed_by = %changed_by,
        "Actor is_human flag changed"
    );

    get_actor(pool, actor_id).await
}

fn map_actor(row: &sqlx::sqlite::SqliteRow) -> Result<Actor> {
    let id_str: String = row.get("id");
    let role_str: String = row.get("role");
    let created_at_str: String = row.get("created_at");

    Ok(Actor {
        id: parse_uuid(&id_str)?,
        email: row.get("email"),
        role: ActorRole::parse(&role_str)
            .ok_or_else(|| Error::Internal(format!("unknown actor role '{role_str}'")))?,
        is_human: row.get("is_human"),
        created_at: parse_ts(&created_at_str)?,
    })
}
