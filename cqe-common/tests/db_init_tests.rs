//! Database initialization tests
//!
//! On-disk schema creation, idempotent re-initialization, seeding, and the
//! recorded schema version.

use cqe_common::db::init::{init_database, SCHEMA_VERSION, SYSTEM_ACTOR_UUID};
use tempfile::TempDir;

#[tokio::test]
async fn creates_schema_on_disk_and_seeds_system_actor() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cqe.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let seeded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM actors WHERE id = ? AND role = 'system'")
            .bind(SYSTEM_ACTOR_UUID)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(seeded, 1);

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn reinitialization_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cqe.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO blogs (id, name, created_by, created_at) VALUES (?, 'kept', ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(SYSTEM_ACTOR_UUID)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    // Opening the same file again re-runs the schema setup without touching
    // existing rows or duplicating the seed.
    let pool = init_database(&db_path).await.unwrap();
    let blogs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blogs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(blogs, 1);

    let actors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM actors")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(actors, 1);
}
