//! Collector configuration structures.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::ConfigError;

/// Default sampling period (250 milliseconds).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(250);

/// Kernel event categories enabled on the device for every trace session.
///
/// A user-supplied event list is merged on top as a set union; duplicates are
/// removed and order is not significant.
pub const DEFAULT_EVENTS: &[&str] = &[
    "phonelab_info",
    "phonelab_periodic_warning_cpu",
    "phonelab_num_online_cpus",
    "phonelab_periodic_lim_exceeded",
    "phonelab_proc_foreground",
    "phonelab_periodic_ctx_switch_info",
    "phonelab_periodic_ctx_switch_marker",
    "sched_cpu_hotplug",
    "cpufreq_scaling",
    "cpu_frequency",
    "kgsl_gpubusy",
    "kgsl_pwrlevel",
    "thermal_temp",
    "optimal_freq",
    "tempfreq_hotplug",
    "tempfreq_binary_diff",
    "tempfreq_cgroup_copy_tasks",
    "tempfreq_hotplug_autosmp_rates",
    "tempfreq_hotplug_nr_running",
    "tempfreq_hotplug_state",
    "tempfreq_hotplug_target",
    "tempfreq_mpdecision_blocked",
    "tempfreq_temp",
    "tempfreq_thermal_bg_throttling_proc",
    "tempfreq_thermal_cgroup_throttling",
    "tempfreq_timing",
];

fn default_enabled() -> bool {
    true
}

fn default_period() -> Duration {
    DEFAULT_PERIOD
}

/// Configuration for a periodic command-polling collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Unique name for this collector instance.
    pub name: String,
    /// Device command producing one reading per invocation.
    pub command: String,
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sampling period (default: 250ms). Zero is legal and polls tightly.
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl PollConfig {
    /// Create a new polling collector configuration.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            enabled: true,
            period: DEFAULT_PERIOD,
            description: None,
        }
    }

    /// Set the sampling period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "poll command cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a streaming trace collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Unique name for this collector instance.
    pub name: String,
    /// Host command producing the continuous feed on stdout.
    pub stream_command: String,
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Event categories to enable on the device, merged with the built-in
    /// default set.
    #[serde(default)]
    pub events: Vec<String>,
    /// Custom line filter pattern with one capture group; defaults to the
    /// kernel-trace pattern when absent.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl TraceConfig {
    /// Create a new trace collector configuration.
    pub fn new(name: impl Into<String>, stream_command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_command: stream_command.into(),
            enabled: true,
            events: Vec::new(),
            pattern: None,
            description: None,
        }
    }

    /// Set the user event list.
    pub fn with_events(mut self, events: Vec<String>) -> Self {
        self.events = events;
        self
    }

    /// Set a custom line filter pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The full event set for this session: built-in defaults merged with the
    /// user list, deduplicated.
    pub fn effective_events(&self) -> Vec<String> {
        let mut events: BTreeSet<String> =
            DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect();
        events.extend(self.events.iter().cloned());
        events.into_iter().collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "trace stream_command cannot be empty".to_string(),
            ));
        }
        if let Some(ref pattern) = self.pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid trace pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Collector configurations grouped by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// Periodic command-polling collectors.
    #[serde(default)]
    pub poll: Vec<PollConfig>,

    /// Streaming trace collectors.
    #[serde(default)]
    pub trace: Vec<TraceConfig>,
}

impl CollectorsConfig {
    /// Merge another CollectorsConfig into this one.
    #[must_use]
    pub fn merge(mut self, other: CollectorsConfig) -> Self {
        self.poll.extend(other.poll);
        self.trace.extend(other.trace);
        self
    }

    /// Validate all collector configurations.
    ///
    /// Names must be non-empty and unique across both kinds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_names = HashSet::new();

        for poll in &self.poll {
            if poll.name.is_empty() {
                return Err(ConfigError::Validation(
                    "poll collector name cannot be empty".to_string(),
                ));
            }
            if !seen_names.insert(&poll.name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate collector name: '{}'",
                    poll.name
                )));
            }
            poll.validate().map_err(|e| {
                ConfigError::Validation(format!("poll collector '{}': {}", poll.name, e))
            })?;
        }

        for trace in &self.trace {
            if trace.name.is_empty() {
                return Err(ConfigError::Validation(
                    "trace collector name cannot be empty".to_string(),
                ));
            }
            if !seen_names.insert(&trace.name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate collector name: '{}'",
                    trace.name
                )));
            }
            trace.validate().map_err(|e| {
                ConfigError::Validation(format!("trace collector '{}': {}", trace.name, e))
            })?;
        }

        Ok(())
    }

    /// Load collector configurations from all YAML files in a directory.
    pub fn load_from_dir(dir_path: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(dir_path);
        if !dir.exists() {
            return Err(ConfigError::Validation(format!(
                "collector_path '{dir_path}' does not exist"
            )));
        }
        if !dir.is_dir() {
            return Err(ConfigError::Validation(format!(
                "collector_path '{dir_path}' is not a directory"
            )));
        }

        let mut merged = Self::default();
        let entries = std::fs::read_dir(dir)?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "yaml" && ext != "yml" {
                continue;
            }

            tracing::debug!("Loading collector config from: {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let file_config: Self = serde_yaml::from_str(&content).map_err(|e| {
                ConfigError::Validation(format!("failed to parse '{}': {}", path.display(), e))
            })?;

            merged = merged.merge(file_config);
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_config_serde_defaults() {
        let yaml = r#"
name: temperature
command: cat /sys/class/thermal/thermal_zone5/temp
"#;

        let config: PollConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.period, Duration::from_millis(250));
        assert!(config.description.is_none());
    }

    #[test]
    fn test_poll_config_serde_roundtrip() {
        let yaml = r#"
name: fps
command: cat /sys/class/graphics/fb0/measured_fps
enabled: false
period: 1s
description: Frame rate counter
"#;

        let config: PollConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "fps");
        assert!(!config.enabled);
        assert_eq!(config.period, Duration::from_secs(1));
        assert_eq!(config.description.as_deref(), Some("Frame rate counter"));
    }

    #[test]
    fn test_poll_config_empty_command_rejected() {
        let config = PollConfig::new("bad", "  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trace_effective_events_union() {
        let config = TraceConfig::new("trace", "adb logcat").with_events(vec![
            "my_custom_event".to_string(),
            "thermal_temp".to_string(),
        ]);

        let events = config.effective_events();
        assert!(events.contains(&"my_custom_event".to_string()));
        assert!(events.contains(&"cpu_frequency".to_string()));
        // Duplicates collapse
        assert_eq!(
            events.iter().filter(|e| e.as_str() == "thermal_temp").count(),
            1
        );
        assert_eq!(events.len(), DEFAULT_EVENTS.len() + 1);
    }

    #[test]
    fn test_trace_config_invalid_pattern_rejected() {
        let config = TraceConfig::new("trace", "adb logcat").with_pattern("([unclosed");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid trace pattern"));
    }

    #[test]
    fn test_collectors_config_merge() {
        let config1 = CollectorsConfig {
            poll: vec![PollConfig::new("fps", "cat fps")],
            trace: vec![],
        };
        let config2 = CollectorsConfig {
            poll: vec![PollConfig::new("temperature", "cat temp")],
            trace: vec![TraceConfig::new("kernel", "adb logcat")],
        };

        let merged = config1.merge(config2);
        assert_eq!(merged.poll.len(), 2);
        assert_eq!(merged.trace.len(), 1);
    }

    #[test]
    fn test_collectors_config_validate_duplicate_names() {
        let config = CollectorsConfig {
            poll: vec![
                PollConfig::new("duplicate", "cat a"),
                PollConfig::new("duplicate", "cat b"),
            ],
            trace: vec![],
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_collectors_config_validate_cross_kind_duplicate() {
        let config = CollectorsConfig {
            poll: vec![PollConfig::new("same-name", "cat a")],
            trace: vec![TraceConfig::new("same-name", "adb logcat")],
        };

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_collectors_config_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("poll.yaml"),
            "poll:\n  - name: fps\n    command: cat fps\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("trace.yml"),
            "trace:\n  - name: kernel\n    stream_command: adb logcat\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not yaml").unwrap();

        let config = CollectorsConfig::load_from_dir(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.poll.len(), 1);
        assert_eq!(config.trace.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_collectors_config_load_from_missing_dir() {
        let result = CollectorsConfig::load_from_dir("/nonexistent/sonde-collectors");
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }
}
