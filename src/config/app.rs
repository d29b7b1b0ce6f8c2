//! Application configuration structures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::collector::CollectorsConfig;
use super::validation::ConfigError;

/// Default session output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./sessions";

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory receiving one output file per collector session.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Collector configurations grouped by kind.
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Path to a directory with additional collector config files.
    #[serde(default)]
    pub collector_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            collectors: CollectorsConfig::default(),
            collector_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir cannot be empty".to_string(),
            ));
        }
        self.collectors.validate()?;
        Ok(())
    }

    /// Load configuration including the `collector_path` directory.
    ///
    /// If `collector_path` is specified, scans the directory for YAML files
    /// and merges their collector configurations.
    pub fn load_with_collector_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;

        if let Some(ref collector_dir) = config.collector_path {
            let additional = CollectorsConfig::load_from_dir(collector_dir)?;
            config.collectors = config.collectors.merge(additional);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
output_dir: /tmp/sonde-sessions
collectors:
  poll:
    - name: temperature
      command: cat /sys/class/thermal/thermal_zone5/temp
      period: 500ms
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, "/tmp/sonde-sessions");
        assert_eq!(config.collectors.poll.len(), 1);
        assert_eq!(
            config.collectors.poll[0].period,
            std::time::Duration::from_millis(500)
        );
    }

    #[test]
    fn test_app_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.output_dir, DEFAULT_OUTPUT_DIR);
        assert!(config.collectors.poll.is_empty());
        assert!(config.collector_path.is_none());
    }

    #[test]
    fn test_app_config_load_with_collector_path() {
        let dir = tempfile::tempdir().unwrap();
        let include = dir.path().join("collectors.d");
        std::fs::create_dir(&include).unwrap();
        std::fs::write(
            include.join("extra.yaml"),
            "poll:\n  - name: fps\n    command: cat fps\n",
        )
        .unwrap();

        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            format!(
                "collector_path: {}\ncollectors:\n  poll:\n    - name: temperature\n      command: cat temp\n",
                include.display()
            ),
        )
        .unwrap();

        let config = AppConfig::load_with_collector_path(&path).unwrap();
        assert_eq!(config.collectors.poll.len(), 2);
    }

    #[test]
    fn test_app_config_rejects_duplicates_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        let include = dir.path().join("collectors.d");
        std::fs::create_dir(&include).unwrap();
        std::fs::write(
            include.join("extra.yaml"),
            "poll:\n  - name: temperature\n    command: cat other\n",
        )
        .unwrap();

        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            format!(
                "collector_path: {}\ncollectors:\n  poll:\n    - name: temperature\n      command: cat temp\n",
                include.display()
            ),
        )
        .unwrap();

        let result = AppConfig::load_with_collector_path(&path);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
