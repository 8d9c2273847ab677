//! Engine configuration loading
//!
//! Resolution follows the priority order used across CQE deployments:
//! 1. Environment variables (highest priority)
//! 2. TOML config file
//! 3. Compiled defaults (fallback)
//!
//! Unknown configuration keys are rejected at startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
///
/// All review/rewrite timing knobs live here. The scorer set is configured by
/// id, in desired execution order; an empty list means no scorers run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Minimum seconds a version must sit in review before approve/reject.
    pub min_review_duration_seconds: i64,

    /// Approvals granted within this many seconds of version creation are
    /// audited as fast approvals.
    pub fast_approval_threshold_seconds: i64,

    /// Hard cap on rewrite cycles per blog.
    pub max_rewrite_cycles: i64,

    /// Review cycles (submit-for-review events) per blog before escalation.
    pub max_review_cycles_per_blog: i64,

    /// Deadline for a single Rewriter.generate call.
    pub rewriter_timeout_seconds: u64,

    /// Scorer ids to run, in execution order.
    pub enabled_detectors: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_review_duration_seconds: 300,
            fast_approval_threshold_seconds: 30,
            max_rewrite_cycles: 10,
            max_review_cycles_per_blog: 5,
            rewriter_timeout_seconds: 120,
            enabled_detectors: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string. Unknown keys fail.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("cannot read {}: {e}", p.display())))?;
                Self::from_toml_str(&content)?
            }
            None => match default_config_file() {
                Some(p) if p.exists() => {
                    let content = std::fs::read_to_string(&p)?;
                    Self::from_toml_str(&content)?
                }
                _ => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CQE_`-prefixed environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_i64("CQE_MIN_REVIEW_DURATION_SECONDS")? {
            self.min_review_duration_seconds = v;
        }
        if let Some(v) = env_i64("CQE_FAST_APPROVAL_THRESHOLD_SECONDS")? {
            self.fast_approval_threshold_seconds = v;
        }
        if let Some(v) = env_i64("CQE_MAX_REWRITE_CYCLES")? {
            self.max_rewrite_cycles = v;
        }
        if let Some(v) = env_i64("CQE_MAX_REVIEW_CYCLES_PER_BLOG")? {
            self.max_review_cycles_per_blog = v;
        }
        if let Some(v) = env_i64("CQE_REWRITER_TIMEOUT_SECONDS")? {
            if v < 0 {
                return Err(Error::Config(
                    "CQE_REWRITER_TIMEOUT_SECONDS must not be negative".to_string(),
                ));
            }
            self.rewriter_timeout_seconds = v as u64;
        }
        if let Ok(list) = std::env::var("CQE_ENABLED_DETECTORS") {
            self.enabled_detectors = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.min_review_duration_seconds < 0 {
            return Err(Error::Config(
                "min_review_duration_seconds must be >= 0".to_string(),
            ));
        }
        if self.fast_approval_threshold_seconds < 0 {
            return Err(Error::Config(
                "fast_approval_threshold_seconds must be >= 0".to_string(),
            ));
        }
        if self.max_rewrite_cycles < 1 {
            return Err(Error::Config("max_rewrite_cycles must be >= 1".to_string()));
        }
        if self.max_review_cycles_per_blog < 1 {
            return Err(Error::Config(
                "max_review_cycles_per_blog must be >= 1".to_string(),
            ));
        }
        if self.rewriter_timeout_seconds == 0 {
            return Err(Error::Config(
                "rewriter_timeout_seconds must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_i64(name: &str) -> Result<Option<i64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let v = raw
                .parse::<i64>()
                .map_err(|_| Error::Config(format!("{name} must be an integer, got '{raw}'")))?;
            Ok(Some(v))
        }
        Err(_) => Ok(None),
    }
}

/// Default configuration file path for the platform
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cqe").join("config.toml"))
}
