//! Scorer registry
//!
//! Organizational only: stores scorer factories and enumerates them
//! deterministically. No execution, no I/O, no environment access. Iteration
//! order is insertion order; activation order is configuration order.

use crate::scoring::{AeoScorer, AiLikenessScorer, Scorer};
use cqe_common::{Error, Result};

/// Factory producing a scorer instance
pub type ScorerFactory = Box<dyn Fn() -> Box<dyn Scorer> + Send + Sync>;

/// Name and version of a registered scorer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorerMetadata {
    pub name: String,
    pub version: String,
}

struct Entry {
    id: String,
    factory: ScorerFactory,
}

/// Registry of scorer factories
///
/// Process-scoped, written only at startup. Prefer passing an instance into
/// constructors over any global.
#[derive(Default)]
pub struct ScorerRegistry {
    entries: Vec<Entry>,
}

impl ScorerRegistry {
    /// Empty registry; scorers must be registered explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the two built-in scorers.
    pub fn with_builtin_scorers() -> Self {
        let mut registry = Self::new();
        registry
            .register(crate::scoring::ai_likeness::SCORER_ID, || {
                Box::new(AiLikenessScorer)
            })
            .expect("builtin ai_likeness registration cannot collide");
        registry
            .register(crate::scoring::aeo::SCORER_ID, || Box::new(AeoScorer))
            .expect("builtin aeo registration cannot collide");
        registry
    }

    /// Register a scorer factory under a unique id.
    pub fn register<F>(&mut self, id: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Scorer> + Send + Sync + 'static,
    {
        if self.is_registered(id) {
            return Err(Error::Conflict(format!(
                "scorer '{id}' is already registered"
            )));
        }
        self.entries.push(Entry {
            id: id.to_string(),
            factory: Box::new(factory),
        });
        Ok(())
    }

    /// Remove a registration.
    pub fn unregister(&mut self, id: &str) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Err(Error::NotFound(format!("scorer '{id}' is not registered")));
        }
        Ok(())
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Registered ids in insertion order.
    pub fn list_registered(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Factory lookup by id.
    pub fn get_factory(&self, id: &str) -> Option<&ScorerFactory> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.factory)
    }

    /// Name and version of a registered scorer.
    pub fn get_metadata(&self, id: &str) -> Option<ScorerMetadata> {
        self.get_factory(id).map(|factory| {
            let scorer = factory();
            ScorerMetadata {
                name: scorer.id().to_string(),
                version: scorer.version().to_string(),
            }
        })
    }

    /// Instantiate the active scorers for a configuration.
    ///
    /// When `enabled` names an explicit list, instances come back in exactly
    /// that order and every unknown id fails with `validation`. When it is
    /// absent, no scorers are active; there are no hidden defaults.
    pub fn active(&self, enabled: Option<&[String]>) -> Result<Vec<Box<dyn Scorer>>> {
        let Some(ids) = enabled else {
            return Ok(Vec::new());
        };

        let mut scorers = Vec::with_capacity(ids.len());
        for id in ids {
            let factory = self.get_factory(id).ok_or_else(|| {
                Error::Validation(format!("unknown scorer id in configuration: '{id}'"))
            })?;
            scorers.push(factory());
        }
        Ok(scorers)
    }
}
