//! Database and engine fixtures for integration tests

use cqe_common::config::EngineConfig;
use cqe_common::db::init::init_memory_database;
use cqe_common::db::models::{Actor, ActorRole};
use cqe_common::events::EventBus;
use cqe_engine::pipeline::EvaluationPipeline;
use cqe_engine::registry::ScorerRegistry;
use cqe_engine::review::ReviewService;
use cqe_engine::rewrite::{RewriteOrchestrator, Rewriter, StaticRewriter};
use cqe_engine::runner::WorkflowRunner;
use cqe_engine::store::{actors, ContentStore};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Fully wired engine over an in-memory database
pub struct TestEngine {
    pub pool: SqlitePool,
    pub store: ContentStore,
    pub config: EngineConfig,
    pub events: EventBus,
    pub runner: Arc<WorkflowRunner>,
    pub registry: Arc<ScorerRegistry>,
    pub pipeline: EvaluationPipeline,
    pub review: ReviewService,
    /// Human writer
    pub writer: Actor,
    /// Human reviewer
    pub reviewer: Actor,
    /// Human admin
    pub admin: Actor,
    /// Non-human service account (role system)
    pub robot: Actor,
}

/// Test configuration: no review timer, no fast-approval window, both
/// built-in scorers enabled.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        min_review_duration_seconds: 0,
        fast_approval_threshold_seconds: 0,
        enabled_detectors: vec![
            "ai_likeness_rubric".to_string(),
            "aeo_rubric".to_string(),
        ],
        ..EngineConfig::default()
    }
}

/// Build a wired engine with the given configuration.
pub async fn test_engine(config: EngineConfig) -> TestEngine {
    super::log_capture::init_test_logging();
    let pool = init_memory_database().await.expect("in-memory schema");
    let events = EventBus::new(64);
    let store = ContentStore::new(pool.clone(), events.clone());
    let runner = Arc::new(WorkflowRunner::with_backoff_base(Duration::ZERO));
    let registry = Arc::new(ScorerRegistry::with_builtin_scorers());
    let pipeline = EvaluationPipeline::new(
        pool.clone(),
        store.clone(),
        registry.clone(),
        runner.clone(),
        config.clone(),
        events.clone(),
    );
    let review = ReviewService::new(pool.clone(), store.clone(), config.clone(), events.clone());

    let writer = actors::create_actor(&pool, "writer@test.dev", ActorRole::Writer, true)
        .await
        .unwrap();
    let reviewer = actors::create_actor(&pool, "reviewer@test.dev", ActorRole::Reviewer, true)
        .await
        .unwrap();
    let admin = actors::create_actor(&pool, "admin@test.dev", ActorRole::Admin, true)
        .await
        .unwrap();
    let robot = actors::create_actor(&pool, "robot@test.dev", ActorRole::System, false)
        .await
        .unwrap();

    TestEngine {
        pool,
        store,
        config,
        events,
        runner,
        registry,
        pipeline,
        review,
        writer,
        reviewer,
        admin,
        robot,
    }
}

impl TestEngine {
    /// Orchestrator over this engine with an injected rewriter.
    pub fn orchestrator(&self, rewriter: Arc<dyn Rewriter>) -> RewriteOrchestrator {
        RewriteOrchestrator::new(
            self.pool.clone(),
            self.store.clone(),
            self.pipeline.clone(),
            rewriter,
            self.runner.clone(),
            self.config.clone(),
            self.events.clone(),
        )
    }

    /// Orchestrator whose rewriter always returns `output`.
    pub fn orchestrator_with_output(&self, output: &str) -> RewriteOrchestrator {
        self.orchestrator(Arc::new(StaticRewriter::new(output)))
    }
}

/// Markdown content that scores well on the AEO rubric and low on the
/// AI-likeness rubric.
pub fn strong_content() -> String {
    let mut body = String::from("# Widget Tuning Field Notes\n\n");
    body.push_str(
        "Widget tuning cut our cycle time 42% last quarter. We benchmarked the \
         3-stage pipeline against 12 production workloads in 2024; raw data sits at \
         https://example.com/bench and the method at https://example.com/method. \
         Honestly, we didn't expect the dampers to matter that much.\n\n",
    );
    body.push_str("## What actually moved the needle\n\n");
    for i in 1..=7 {
        body.push_str(&format!("- Damper {i} retuned against workload {i}\n"));
    }
    body.push_str("\n## Raw results\n\n");
    for i in 0..70 {
        body.push_str(&format!(
            "Run {i} finished in {} seconds and didn't drift. ",
            30 + (i * 7) % 40
        ));
    }
    body
}

/// Content that trips the rewrite triggers: no structure, no specifics,
/// heavy AI-phrasing.
pub fn weak_content() -> String {
    "In this article, we will explore the landscape of content. It's important \
     to note that in today's world, comprehensive strategies are essential. \
     Generally speaking, one should leverage robust and holistic approaches. \
     Furthermore, it is important to utilize cutting edge methods. In conclusion, \
     a paradigm shift may be required. Please note that results typically vary. \
     Keep in mind that at the end of the day, optimization is a game changer."
        .to_string()
}
