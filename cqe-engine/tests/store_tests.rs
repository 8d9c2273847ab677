//! Content store integration tests
//!
//! Covers the storage-level contracts: write-once rows, partial
//! immutability, uniqueness races, human verification at the storage
//! boundary, and append-only revocation.

mod helpers;

use cqe_common::db::models::VersionSource;
use cqe_engine::store::versions::{content_hash, AppendVersion};
use cqe_engine::Error;
use helpers::{fast_config, test_engine};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[tokio::test]
async fn create_blog_rejects_empty_name() {
    let engine = test_engine(fast_config()).await;
    let err = engine
        .store
        .create_blog("   ", engine.writer.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn version_numbers_increment_and_hash_matches() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("Launch Notes", engine.writer.id, None)
        .await
        .unwrap();

    let v1 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "first draft of the launch notes",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    assert_eq!(v1.version_number, 1);

    let expected = format!("{:x}", Sha256::digest(b"first draft of the launch notes"));
    assert_eq!(v1.content_hash, expected);
    assert_eq!(v1.content_hash, content_hash(&v1.content));

    let v2 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "second draft",
            source: VersionSource::HumanEdit,
            parent_version_id: Some(v1.id),
            change_reason: Some("tightened intro"),
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    assert_eq!(v2.version_number, 2);
    assert_eq!(v2.parent_version_id, Some(v1.id));

    let listed = engine.store.list_versions(blog.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, v1.id);
    assert_eq!(listed[1].id, v2.id);
}

#[tokio::test]
async fn ai_rewrite_requires_cycle_id() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("b", engine.writer.id, None)
        .await
        .unwrap();
    let v1 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "root",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    let err = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "rewritten",
            source: VersionSource::AiRewrite,
            parent_version_id: Some(v1.id),
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn parent_must_belong_to_same_blog() {
    let engine = test_engine(fast_config()).await;
    let blog_a = engine
        .store
        .create_blog("a", engine.writer.id, None)
        .await
        .unwrap();
    let blog_b = engine
        .store
        .create_blog("b", engine.writer.id, None)
        .await
        .unwrap();
    let v_a = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog_a.id,
            content: "root a",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    engine
        .store
        .append_version(AppendVersion {
            blog_id: blog_b.id,
            content: "root b",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    let err = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog_b.id,
            content: "cross-blog child",
            source: VersionSource::HumanEdit,
            parent_version_id: Some(v_a.id),
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn version_rows_are_write_once_at_storage_layer() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("immutable", engine.writer.id, None)
        .await
        .unwrap();
    let v1 = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "locked in",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    let update = sqlx::query("UPDATE blog_versions SET content = 'tampered' WHERE id = ?")
        .bind(v1.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM blog_versions WHERE id = ?")
        .bind(v1.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(delete.is_err());

    // Unchanged on disk.
    let reloaded = engine.store.get_version(v1.id).await.unwrap();
    assert_eq!(reloaded.content, "locked in");
}

#[tokio::test]
async fn blog_name_is_immutable() {
    let engine = test_engine(fast_config()).await;
    let blog = engine
        .store
        .create_blog("fixed name", engine.writer.id, None)
        .await
        .unwrap();

    let update = sqlx::query("UPDATE blogs SET name = 'renamed' WHERE id = ?")
        .bind(blog.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());
}

async fn seed_version(engine: &helpers::TestEngine, name: &str) -> (Uuid, Uuid) {
    let blog = engine
        .store
        .create_blog(name, engine.writer.id, None)
        .await
        .unwrap();
    let version = engine
        .store
        .append_version(AppendVersion {
            blog_id: blog.id,
            content: "some reviewable content",
            source: VersionSource::HumanPaste,
            parent_version_id: None,
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();
    (blog.id, version.id)
}

#[tokio::test]
async fn approval_requires_human_actor() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "human only").await;

    let err = engine
        .store
        .record_approval(blog_id, version_id, engine.robot.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(engine.store.current_approval(blog_id).await.unwrap().is_none());
}

#[tokio::test]
async fn approval_human_check_is_trigger_enforced() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "trigger check").await;

    // Bypass the store and insert directly: the trigger still refuses.
    let insert = sqlx::query(
        r#"
        INSERT INTO approval_states (id, blog_id, approved_version_id, approver_id, approved_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(blog_id.to_string())
    .bind(version_id.to_string())
    .bind(engine.robot.id.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&engine.pool)
    .await;
    assert!(insert.is_err());
}

#[tokio::test]
async fn approval_version_must_belong_to_blog() {
    let engine = test_engine(fast_config()).await;
    let (blog_a, _) = seed_version(&engine, "blog a").await;
    let (_, version_b) = seed_version(&engine, "blog b").await;

    let err = engine
        .store
        .record_approval(blog_a, version_b, engine.reviewer.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidVersion(_)));
}

#[tokio::test]
async fn repeat_approval_is_idempotent() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "idempotent").await;

    let first = engine
        .store
        .record_approval(blog_id, version_id, engine.reviewer.id, None)
        .await
        .unwrap();
    let second = engine
        .store
        .record_approval(blog_id, version_id, engine.reviewer.id, None)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM approval_states WHERE blog_id = ?")
        .bind(blog_id.to_string())
        .fetch_one(&engine.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn revocation_is_append_only_and_clears_current() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "revocable").await;

    engine
        .store
        .record_approval(blog_id, version_id, engine.reviewer.id, None)
        .await
        .unwrap();
    assert!(engine.store.current_approval(blog_id).await.unwrap().is_some());

    engine
        .store
        .revoke_approval(blog_id, engine.admin.id, "stale guidance")
        .await
        .unwrap();
    assert!(engine.store.current_approval(blog_id).await.unwrap().is_none());

    // Two rows: the original approval and the revocation companion.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM approval_states WHERE blog_id = ?")
        .bind(blog_id.to_string())
        .fetch_one(&engine.pool)
        .await
        .unwrap();
    assert_eq!(count, 2);

    // Rows never change after insert.
    let update = sqlx::query("UPDATE approval_states SET notes = 'edited' WHERE blog_id = ?")
        .bind(blog_id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());
}

#[tokio::test]
async fn fresh_approval_after_revocation_becomes_current() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, v1) = seed_version(&engine, "re-approve").await;
    let v2 = engine
        .store
        .append_version(AppendVersion {
            blog_id,
            content: "second version content",
            source: VersionSource::HumanEdit,
            parent_version_id: Some(v1),
            change_reason: None,
            source_rewrite_cycle_id: None,
            created_by: engine.writer.id,
        })
        .await
        .unwrap();

    engine
        .store
        .record_approval(blog_id, v1, engine.reviewer.id, None)
        .await
        .unwrap();
    engine
        .store
        .revoke_approval(blog_id, engine.admin.id, "superseded")
        .await
        .unwrap();
    engine
        .store
        .record_approval(blog_id, v2.id, engine.reviewer.id, None)
        .await
        .unwrap();

    let current = engine.store.current_approval(blog_id).await.unwrap().unwrap();
    assert_eq!(current.approved_version_id, v2.id);
}

#[tokio::test]
async fn revoke_without_current_approval_is_invalid_state() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, _) = seed_version(&engine, "nothing to revoke").await;

    let err = engine
        .store
        .revoke_approval(blog_id, engine.admin.id, "noop")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn escalation_state_is_derived_from_open_rows() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "escalated").await;

    assert!(!engine.store.is_escalated(blog_id).await.unwrap());

    let escalation = engine
        .store
        .open_escalation(
            blog_id,
            version_id,
            cqe_common::db::models::EscalationReason::Ambiguity,
            None,
        )
        .await
        .unwrap();
    assert!(engine.store.is_escalated(blog_id).await.unwrap());

    engine
        .store
        .resolve_escalation(escalation.id, engine.admin.id, false)
        .await
        .unwrap();
    assert!(!engine.store.is_escalated(blog_id).await.unwrap());

    // Resolving twice is a state error; the status cannot move again.
    let err = engine
        .store
        .resolve_escalation(escalation.id, engine.admin.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn escalation_core_fields_are_immutable() {
    let engine = test_engine(fast_config()).await;
    let (blog_id, version_id) = seed_version(&engine, "immutable escalation").await;
    let escalation = engine
        .store
        .open_escalation(
            blog_id,
            version_id,
            cqe_common::db::models::EscalationReason::LowQuality,
            None,
        )
        .await
        .unwrap();

    let update = sqlx::query("UPDATE escalations SET reason = 'ambiguity' WHERE id = ?")
        .bind(escalation.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());
}

#[tokio::test]
async fn actor_identity_immutable_but_is_human_togglable_by_admin() {
    let engine = test_engine(fast_config()).await;

    let update = sqlx::query("UPDATE actors SET email = 'new@test.dev' WHERE id = ?")
        .bind(engine.writer.id.to_string())
        .execute(&engine.pool)
        .await;
    assert!(update.is_err());

    // Non-admin cannot toggle.
    let err = cqe_engine::store::actors::set_is_human(
        &engine.pool,
        engine.writer.id,
        false,
        engine.reviewer.id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Admin can.
    let updated = cqe_engine::store::actors::set_is_human(
        &engine.pool,
        engine.writer.id,
        false,
        engine.admin.id,
    )
    .await
    .unwrap();
    assert!(!updated.is_human);

    // System actors can never become human.
    let err = cqe_engine::store::actors::set_is_human(
        &engine.pool,
        engine.robot.id,
        true,
        engine.admin.id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
