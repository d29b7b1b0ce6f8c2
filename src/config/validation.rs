//! Configuration validation utilities.

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in a configured command string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
///
/// Device commands routinely embed per-host values (a device serial, a tool
/// path); expansion happens once, at instrument setup.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_plain_command() {
        assert_eq!(
            expand_env_vars("cat /proc/uptime"),
            "cat /proc/uptime"
        );
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("adb -s ${SONDE_NONEXISTENT_SERIAL:-emulator-5554} shell");
        assert_eq!(result, "adb -s emulator-5554 shell");
    }

    #[test]
    fn test_expand_env_vars_missing_without_default() {
        let result = expand_env_vars("adb -s ${SONDE_NONEXISTENT_SERIAL} shell");
        assert_eq!(result, "adb -s  shell");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("SONDE_TEST_SERIAL", "0123456789ab");
        }
        let result = expand_env_vars("adb -s ${SONDE_TEST_SERIAL} logcat");
        assert_eq!(result, "adb -s 0123456789ab logcat");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("SONDE_TEST_SERIAL");
        }
    }
}
