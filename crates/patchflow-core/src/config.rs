//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffSchedule;
use crate::locate::LocatingMode;

/// Policy governing one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Locator strategy; `None` skips range narrowing and prompts with the
    /// full issue/code text only.
    pub locating: Option<LocatingMode>,

    /// Drafting attempts before escalating to the review gate.
    pub max_retries: u32,

    /// Whole-invocation attempts before surfacing exhaustion.
    pub max_invocation_attempts: u32,

    /// Wait envelope between invocation attempts.
    pub backoff: BackoffSchedule,

    /// Where run-history artifacts are written; `None` disables persistence.
    pub history_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locating: Some(LocatingMode::ModelDriven),
            max_retries: 3,
            max_invocation_attempts: 5,
            backoff: BackoffSchedule::default(),
            history_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.locating, Some(LocatingMode::ModelDriven));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_invocation_attempts, 5);
        assert_eq!(config.backoff.min_secs, 30);
        assert!(config.history_dir.is_none());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = PipelineConfig {
            locating: Some(LocatingMode::Jaccard),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let deserialized: PipelineConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, deserialized);
    }
}
