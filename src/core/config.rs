/// Engine configuration, loadable from RON.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::scenario::ScenarioType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Playback options supplied by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scenario to load when the host calls `SimulationEngine::init`.
    pub initial_scenario: Option<ScenarioType>,
    /// Start playing as soon as a scenario finishes loading.
    pub auto_play: bool,
    /// Restart automatically after the scenario completes.
    pub loop_playback: bool,
    /// Playback speed multiplier; 2.0 plays twice as fast.
    pub speed: f64,
    /// Log every executed action at debug level instead of trace.
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_scenario: None,
            auto_play: true,
            loop_playback: false,
            speed: 1.0,
            debug: false,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.auto_play);
        assert!(!config.loop_playback);
        assert_eq!(config.speed, 1.0);
        assert!(config.initial_scenario.is_none());
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config = EngineConfig::parse_ron(
            r#"(
                initial_scenario: Some("ecommerce-catalog"),
                loop_playback: true,
                speed: 2.0,
            )"#,
        )
        .unwrap();
        assert_eq!(config.initial_scenario, Some(ScenarioType::EcommerceCatalog));
        assert!(config.loop_playback);
        assert!(config.auto_play);
        assert_eq!(config.speed, 2.0);
        assert!(!config.debug);
    }

    #[test]
    fn unknown_scenario_tag_is_an_error() {
        let result = EngineConfig::parse_ron(r#"(initial_scenario: Some("bakery"))"#);
        assert!(matches!(result, Err(ConfigError::Ron(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = EngineConfig::load_from_ron(Path::new("tests/fixtures/does_not_exist.ron"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
