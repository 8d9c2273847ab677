//! External rewriter capability
//!
//! The engine supplies a verbatim prompt and expects only the rewritten body
//! in return. The concrete client (LLM or otherwise) is injected; the engine
//! never talks to a model directly.

use async_trait::async_trait;
use cqe_common::Result;

/// Injected rewriting capability
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Generate the rewritten article body for a filled prompt.
    ///
    /// Implementations should return `unavailable` for transport problems;
    /// the orchestrator applies its own deadline around this call.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Fixed-output rewriter for tests and dry runs
pub struct StaticRewriter {
    output: String,
}

impl StaticRewriter {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl Rewriter for StaticRewriter {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.output.clone())
    }
}
