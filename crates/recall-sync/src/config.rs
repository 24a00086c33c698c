//! Configuration for the recall-sync pipeline.

use serde::Deserialize;

use crate::execute::ExecutorConfig;
use crate::resolve::ResolverConfig;

/// Top-level sync configuration.
///
/// Loaded from `recall.toml` `[sync]` section or `RECALL_SYNC__`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Entity resolution thresholds.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Retry and deadline settings for plan execution.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Directory for the file-backed audit log.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,

    /// Candidates below this confidence are rejected outright.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_audit_dir() -> String {
    "./audit".to_string()
}

fn default_min_confidence() -> f64 {
    0.3
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            executor: ExecutorConfig::default(),
            audit_dir: default_audit_dir(),
            min_confidence: default_min_confidence(),
        }
    }
}
