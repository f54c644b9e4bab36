//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use std::path::PathBuf;

/// Environment variable holding the optional auth token
pub const TOKEN_ENV_VAR: &str = "COLLAB_TOKEN";

/// Environment variable naming a session to join on startup
pub const SESSION_ENV_VAR: &str = "COLLAB_SESSION";

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Connection configuration (collab_config.yaml)
    Collab,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Collab => "config/collab_config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Collab => "COLLAB_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use realtime_collab::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Collab);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Read a non-empty environment variable
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Collab.default_path(), "config/collab_config.yaml");

        let custom = ConfigType::Custom("custom/path.yaml".to_string());
        assert_eq!(custom.default_path(), "custom/path.yaml");
    }

    #[test]
    fn test_config_type_env_vars() {
        assert_eq!(ConfigType::Collab.env_var_name(), "COLLAB_CONFIG_PATH");
        assert_eq!(
            ConfigType::Custom("x.yaml".to_string()).env_var_name(),
            "CONFIG_PATH"
        );
    }

    #[test]
    fn test_optional_env_ignores_blank_values() {
        std::env::set_var("REALTIME_COLLAB_BLANK_TEST", "  ");
        assert_eq!(optional_env("REALTIME_COLLAB_BLANK_TEST"), None);
        std::env::remove_var("REALTIME_COLLAB_BLANK_TEST");
        assert_eq!(optional_env("REALTIME_COLLAB_BLANK_TEST"), None);
    }
}
