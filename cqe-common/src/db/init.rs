//! Database initialization
//!
//! Creates the engine schema idempotently and installs the immutability
//! triggers. The triggers are the canonical enforcement of the write-once
//! and partial-immutability rules; calling code never relies on discipline
//! alone.

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Fixed id of the built-in system actor (role system, not human).
///
/// Orchestrator-created versions use this id as `created_by`.
pub const SYSTEM_ACTOR_UUID: &str = "00000000-0000-0000-0000-000000000001";

/// Typed form of [`SYSTEM_ACTOR_UUID`]
pub fn system_actor_id() -> Uuid {
    Uuid::parse_str(SYSTEM_ACTOR_UUID).expect("system actor uuid is valid")
}

/// Initialize database connection and create schema if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePool::connect(&db_url).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database for tests and scratch work
///
/// The pool is capped at one connection so every query sees the same
/// in-memory database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables, triggers, and seed rows (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_actors_table(pool).await?;
    create_blogs_table(pool).await?;
    create_blog_versions_table(pool).await?;
    create_evaluation_runs_table(pool).await?;
    create_score_tables(pool).await?;
    create_rewrite_cycles_table(pool).await?;
    create_approval_tables(pool).await?;
    create_review_tables(pool).await?;
    create_escalations_table(pool).await?;

    record_schema_version(pool).await?;
    seed_system_actor(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_actors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS actors (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'writer'
                CHECK (role IN ('writer', 'reviewer', 'admin', 'system')),
            is_human INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            CHECK (role != 'system' OR is_human = 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Identity fields never change; only is_human is mutable (admin action,
    // enforced in the store). Actors are never deleted.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_actors_identity_immutable
        BEFORE UPDATE ON actors
        WHEN NEW.id IS NOT OLD.id
            OR NEW.email IS NOT OLD.email
            OR NEW.role IS NOT OLD.role
            OR NEW.created_at IS NOT OLD.created_at
        BEGIN
            SELECT RAISE(ABORT, 'actor identity fields are immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_actors_no_delete
        BEFORE DELETE ON actors
        BEGIN
            SELECT RAISE(ABORT, 'actors are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_system_actor(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO actors (id, email, role, is_human, created_at)
        VALUES (?, 'system@cqe.internal', 'system', 0, ?)
        "#,
    )
    .bind(SYSTEM_ACTOR_UUID)
    .bind(crate::time::to_db(crate::time::now()))
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_blogs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blogs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK (length(name) > 0),
            project_id TEXT,
            created_by TEXT NOT NULL REFERENCES actors(id),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_blogs_created_by ON blogs(created_by)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_blogs_identity_immutable
        BEFORE UPDATE ON blogs
        WHEN NEW.id IS NOT OLD.id
            OR NEW.name IS NOT OLD.name
            OR NEW.created_by IS NOT OLD.created_by
            OR NEW.created_at IS NOT OLD.created_at
        BEGIN
            SELECT RAISE(ABORT, 'blog identity fields are immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_blogs_no_delete
        BEFORE DELETE ON blogs
        BEGIN
            SELECT RAISE(ABORT, 'blogs are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_blog_versions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blog_versions (
            id TEXT PRIMARY KEY,
            blog_id TEXT NOT NULL REFERENCES blogs(id),
            parent_version_id TEXT REFERENCES blog_versions(id),
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL CHECK (length(content_hash) = 64),
            version_number INTEGER NOT NULL CHECK (version_number >= 1),
            source TEXT NOT NULL
                CHECK (source IN ('human_paste', 'ai_rewrite', 'human_edit')),
            source_rewrite_cycle_id TEXT REFERENCES rewrite_cycles(id),
            change_reason TEXT,
            created_by TEXT NOT NULL REFERENCES actors(id),
            created_at TEXT NOT NULL,
            UNIQUE (blog_id, version_number),
            CHECK (source != 'ai_rewrite' OR source_rewrite_cycle_id IS NOT NULL),
            CHECK (parent_version_id IS NOT NULL OR version_number = 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_blog_versions_blog ON blog_versions(blog_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blog_versions_parent ON blog_versions(parent_version_id)",
    )
    .execute(pool)
    .await?;

    // Lineage stays inside one blog.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_blog_versions_parent_same_blog
        BEFORE INSERT ON blog_versions
        WHEN NEW.parent_version_id IS NOT NULL
            AND (SELECT blog_id FROM blog_versions WHERE id = NEW.parent_version_id)
                IS NOT NEW.blog_id
        BEGIN
            SELECT RAISE(ABORT, 'parent version belongs to a different blog');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_blog_versions_immutable
        BEFORE UPDATE ON blog_versions
        BEGIN
            SELECT RAISE(ABORT, 'blog_versions rows are write-once');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_blog_versions_no_delete
        BEFORE DELETE ON blog_versions
        BEGIN
            SELECT RAISE(ABORT, 'blog_versions rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_evaluation_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evaluation_runs (
            id TEXT PRIMARY KEY,
            blog_version_id TEXT NOT NULL REFERENCES blog_versions(id),
            run_at TEXT NOT NULL,
            triggered_by TEXT REFERENCES actors(id),
            model_config TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing'
                CHECK (status IN ('processing', 'completed', 'partial_failure', 'failed')),
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_eval_runs_version ON evaluation_runs(blog_version_id)",
    )
    .execute(pool)
    .await?;

    // Partial immutability: everything except status and completed_at is
    // frozen at insert.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_eval_runs_core_immutable
        BEFORE UPDATE ON evaluation_runs
        WHEN NEW.id IS NOT OLD.id
            OR NEW.blog_version_id IS NOT OLD.blog_version_id
            OR NEW.run_at IS NOT OLD.run_at
            OR NEW.triggered_by IS NOT OLD.triggered_by
            OR NEW.model_config IS NOT OLD.model_config
        BEGIN
            SELECT RAISE(ABORT, 'evaluation_runs core fields are immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    // Status only advances out of processing, never backward.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_eval_runs_status_forward
        BEFORE UPDATE OF status ON evaluation_runs
        WHEN OLD.status != 'processing' AND NEW.status IS NOT OLD.status
        BEGIN
            SELECT RAISE(ABORT, 'evaluation_runs status cannot transition backward');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_eval_runs_completed_at_once
        BEFORE UPDATE OF completed_at ON evaluation_runs
        WHEN OLD.completed_at IS NOT NULL AND NEW.completed_at IS NOT OLD.completed_at
        BEGIN
            SELECT RAISE(ABORT, 'evaluation_runs completed_at is write-once');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_eval_runs_no_delete
        BEFORE DELETE ON evaluation_runs
        BEGIN
            SELECT RAISE(ABORT, 'evaluation_runs rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_score_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_detector_scores (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES evaluation_runs(id),
            provider TEXT NOT NULL,
            score REAL NOT NULL CHECK (score >= 0 AND score <= 100),
            details TEXT NOT NULL,
            UNIQUE (run_id, provider)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aeo_scores (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES evaluation_runs(id),
            query_intent TEXT NOT NULL,
            score REAL NOT NULL CHECK (score >= 0 AND score <= 100),
            rationale TEXT,
            details TEXT NOT NULL,
            UNIQUE (run_id, query_intent)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for table in ["ai_detector_scores", "aeo_scores"] {
        sqlx::query(&format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_{table}_immutable
            BEFORE UPDATE ON {table}
            BEGIN
                SELECT RAISE(ABORT, '{table} rows are write-once');
            END
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_{table}_no_delete
            BEFORE DELETE ON {table}
            BEGIN
                SELECT RAISE(ABORT, '{table} rows are never deleted');
            END
            "#
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn create_rewrite_cycles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rewrite_cycles (
            id TEXT PRIMARY KEY,
            parent_version_id TEXT NOT NULL REFERENCES blog_versions(id),
            child_version_id TEXT REFERENCES blog_versions(id),
            cycle_number INTEGER NOT NULL CHECK (cycle_number >= 1),
            trigger_reasons TEXT NOT NULL,
            trigger_data TEXT NOT NULL,
            rewrite_prompt TEXT NOT NULL,
            parent_aeo_total REAL,
            parent_ai_likeness_total REAL,
            child_aeo_total REAL,
            child_ai_likeness_total REAL,
            trend_outcome TEXT
                CHECK (trend_outcome IS NULL OR trend_outcome IN
                    ('improving', 'partial_improvement', 'stagnant', 'regressing')),
            trend_code INTEGER
                CHECK (trend_code IS NULL OR trend_code BETWEEN 1 AND 4),
            rewrite_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (rewrite_status IN ('pending', 'completed', 'terminal')),
            stop_reason TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (parent_version_id, cycle_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_rewrite_cycles_parent ON rewrite_cycles(parent_version_id)",
    )
    .execute(pool)
    .await?;

    // Prompt, reasons, and parent snapshots are write-once; child linkage and
    // trend fields may be written exactly once while completing the cycle.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_rewrite_cycles_core_immutable
        BEFORE UPDATE ON rewrite_cycles
        WHEN NEW.id IS NOT OLD.id
            OR NEW.parent_version_id IS NOT OLD.parent_version_id
            OR NEW.cycle_number IS NOT OLD.cycle_number
            OR NEW.trigger_reasons IS NOT OLD.trigger_reasons
            OR NEW.trigger_data IS NOT OLD.trigger_data
            OR NEW.rewrite_prompt IS NOT OLD.rewrite_prompt
            OR NEW.created_at IS NOT OLD.created_at
            OR (OLD.parent_aeo_total IS NOT NULL
                AND NEW.parent_aeo_total IS NOT OLD.parent_aeo_total)
            OR (OLD.parent_ai_likeness_total IS NOT NULL
                AND NEW.parent_ai_likeness_total IS NOT OLD.parent_ai_likeness_total)
            OR (OLD.child_version_id IS NOT NULL
                AND NEW.child_version_id IS NOT OLD.child_version_id)
            OR (OLD.child_aeo_total IS NOT NULL
                AND NEW.child_aeo_total IS NOT OLD.child_aeo_total)
            OR (OLD.child_ai_likeness_total IS NOT NULL
                AND NEW.child_ai_likeness_total IS NOT OLD.child_ai_likeness_total)
            OR (OLD.trend_outcome IS NOT NULL
                AND NEW.trend_outcome IS NOT OLD.trend_outcome)
            OR (OLD.trend_code IS NOT NULL AND NEW.trend_code IS NOT OLD.trend_code)
            OR (OLD.stop_reason IS NOT NULL AND NEW.stop_reason IS NOT OLD.stop_reason)
        BEGIN
            SELECT RAISE(ABORT, 'rewrite_cycles fields are write-once');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_rewrite_cycles_status_forward
        BEFORE UPDATE OF rewrite_status ON rewrite_cycles
        WHEN OLD.rewrite_status != 'pending'
            AND NEW.rewrite_status IS NOT OLD.rewrite_status
        BEGIN
            SELECT RAISE(ABORT, 'rewrite_cycles status cannot transition backward');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_rewrite_cycles_no_delete
        BEFORE DELETE ON rewrite_cycles
        BEGIN
            SELECT RAISE(ABORT, 'rewrite_cycles rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_approval_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS approval_states (
            id TEXT PRIMARY KEY,
            blog_id TEXT NOT NULL REFERENCES blogs(id),
            approved_version_id TEXT NOT NULL REFERENCES blog_versions(id),
            approver_id TEXT NOT NULL REFERENCES actors(id),
            approved_at TEXT NOT NULL,
            revoked_at TEXT,
            revoked_by TEXT REFERENCES actors(id),
            revocation_reason TEXT,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_approval_states_blog ON approval_states(blog_id, approved_at)",
    )
    .execute(pool)
    .await?;

    // Human verification at the storage boundary: the approver row is read
    // at insert time, not trusted from the caller.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_states_human_approver
        BEFORE INSERT ON approval_states
        WHEN (SELECT is_human FROM actors WHERE id = NEW.approver_id) IS NOT 1
        BEGIN
            SELECT RAISE(ABORT, 'approver must be a human actor');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_states_version_in_blog
        BEFORE INSERT ON approval_states
        WHEN (SELECT blog_id FROM blog_versions WHERE id = NEW.approved_version_id)
            IS NOT NEW.blog_id
        BEGIN
            SELECT RAISE(ABORT, 'approved version belongs to a different blog');
        END
        "#,
    )
    .execute(pool)
    .await?;

    // Revocation is modeled as a companion row; existing rows never change.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_states_immutable
        BEFORE UPDATE ON approval_states
        BEGIN
            SELECT RAISE(ABORT, 'approval_states rows are write-once');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_states_no_delete
        BEFORE DELETE ON approval_states
        BEGIN
            SELECT RAISE(ABORT, 'approval_states rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS approval_attempts (
            id TEXT PRIMARY KEY,
            blog_id TEXT NOT NULL REFERENCES blogs(id),
            attempted_by TEXT NOT NULL REFERENCES actors(id),
            is_human_snapshot INTEGER NOT NULL,
            result TEXT NOT NULL
                CHECK (result IN ('success', 'forbidden', 'invalid_state', 'invalid_version')),
            attempted_at TEXT NOT NULL,
            failure_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_approval_attempts_blog ON approval_attempts(blog_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_attempts_immutable
        BEFORE UPDATE ON approval_attempts
        BEGIN
            SELECT RAISE(ABORT, 'approval_attempts rows are append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_approval_attempts_no_delete
        BEFORE DELETE ON approval_attempts
        BEGIN
            SELECT RAISE(ABORT, 'approval_attempts rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_review_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS human_review_actions (
            id TEXT PRIMARY KEY,
            blog_version_id TEXT NOT NULL REFERENCES blog_versions(id),
            reviewer_id TEXT NOT NULL REFERENCES actors(id),
            action TEXT NOT NULL
                CHECK (action IN ('APPROVE', 'REJECT', 'COMMENT', 'REQUEST_CHANGES',
                                  'APPROVE_INTENT', 'SUBMIT_FOR_REVIEW')),
            comments TEXT,
            is_override INTEGER NOT NULL DEFAULT 0,
            justification TEXT,
            risk_acceptance_note TEXT,
            performed_at TEXT NOT NULL,
            CHECK (is_override = 0
                OR (justification IS NOT NULL AND risk_acceptance_note IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_review_actions_version ON human_review_actions(blog_version_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_review_actions_reviewer ON human_review_actions(reviewer_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_review_actions_immutable
        BEFORE UPDATE ON human_review_actions
        BEGIN
            SELECT RAISE(ABORT, 'human_review_actions rows are append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_review_actions_no_delete
        BEFORE DELETE ON human_review_actions
        BEGIN
            SELECT RAISE(ABORT, 'human_review_actions rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    // The one mutable-by-design table: the per-version review state machine.
    // Forward-only transitions are validated in the review service.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_states (
            version_id TEXT PRIMARY KEY REFERENCES blog_versions(id),
            blog_id TEXT NOT NULL REFERENCES blogs(id),
            state TEXT NOT NULL DEFAULT 'draft'
                CHECK (state IN ('draft', 'in_review', 'approved', 'rejected', 'archived')),
            review_started_at TEXT,
            review_duration_seconds INTEGER,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_review_states_blog ON review_states(blog_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_review_states_no_delete
        BEFORE DELETE ON review_states
        BEGIN
            SELECT RAISE(ABORT, 'review_states rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_escalations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS escalations (
            id TEXT PRIMARY KEY,
            blog_id TEXT NOT NULL REFERENCES blogs(id),
            version_id TEXT NOT NULL REFERENCES blog_versions(id),
            reason TEXT NOT NULL
                CHECK (reason IN ('score_regression', 'policy_violation', 'ambiguity', 'low_quality')),
            details TEXT,
            status TEXT NOT NULL DEFAULT 'pending_review'
                CHECK (status IN ('pending_review', 'resolved', 'dismissed')),
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            resolved_by TEXT REFERENCES actors(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_escalations_blog_status ON escalations(blog_id, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_escalations_core_immutable
        BEFORE UPDATE ON escalations
        WHEN NEW.id IS NOT OLD.id
            OR NEW.blog_id IS NOT OLD.blog_id
            OR NEW.version_id IS NOT OLD.version_id
            OR NEW.reason IS NOT OLD.reason
            OR NEW.details IS NOT OLD.details
            OR NEW.created_at IS NOT OLD.created_at
        BEGIN
            SELECT RAISE(ABORT, 'escalations core fields are immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_escalations_status_forward
        BEFORE UPDATE OF status ON escalations
        WHEN OLD.status != 'pending_review' AND NEW.status IS NOT OLD.status
        BEGIN
            SELECT RAISE(ABORT, 'escalations status cannot transition backward');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_escalations_no_delete
        BEFORE DELETE ON escalations
        BEGIN
            SELECT RAISE(ABORT, 'escalations rows are never deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
