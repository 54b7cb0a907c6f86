use crate::error::ConfigError;
use crate::security::ConfirmLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration, loaded once from
/// `<config_dir>/magpie/config.toml` and passed explicitly to constructors;
/// there is no process-global config state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai: AiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }
}

/// The `[security]` section; mapped into `SecurityPolicy` at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub command_level: ConfirmLevel,
    pub restricted_paths: Vec<String>,
    pub readonly_paths: Vec<String>,
    pub allow_shell: bool,
    pub allow_terminal_takeover: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            command_level: ConfirmLevel::Dangerous,
            restricted_paths: Vec::new(),
            readonly_paths: Vec::new(),
            allow_shell: true,
            allow_terminal_takeover: true,
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("", "", "magpie")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::Load("could not determine the user config directory".to_string())
            })
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding one subdirectory per session, each with its queue
    /// file.
    pub fn sessions_dir() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("sessions"))
    }

    /// Load the config file, writing a default one on first run.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let rendered = toml::to_string_pretty(&config)
                    .map_err(|e| ConfigError::Load(e.to_string()))?;
                std::fs::write(&path, rendered)?;
                Ok(config)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "ai.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.ai.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "ai.max_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.timeout_secs, 30);
        assert_eq!(config.security.command_level, ConfirmLevel::Dangerous);
        assert!(config.security.allow_shell);
    }

    #[test]
    fn sections_override_selected_fields() {
        let raw = r#"
            [ai]
            api_key = "sk-test"
            model = "gpt-4o"

            [security]
            command_level = "always"
            restricted_paths = ["/etc", "~/.ssh"]
            allow_shell = false
        "#;
        let config = Config::from_toml(raw).unwrap();
        assert_eq!(config.ai.api_key, "sk-test");
        assert_eq!(config.ai.model, "gpt-4o");
        assert_eq!(config.security.command_level, ConfirmLevel::Always);
        assert_eq!(config.security.restricted_paths.len(), 2);
        assert!(!config.security.allow_shell);
        // Untouched fields keep their defaults.
        assert_eq!(config.ai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let raw = "[ai]\ntimeout_secs = 0\n";
        let err = Config::from_toml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let reparsed = Config::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.ai.model, config.ai.model);
        assert_eq!(
            reparsed.security.command_level,
            config.security.command_level
        );
    }

    #[test]
    fn security_policy_builds_from_config_section() {
        let raw = r#"
            [security]
            command_level = "never"
            readonly_paths = ["/opt/data"]
        "#;
        let config = Config::from_toml(raw).unwrap();
        let policy = crate::security::SecurityPolicy::from_config(&config.security);
        assert_eq!(policy.command_level, ConfirmLevel::Never);
        assert_eq!(policy.readonly_paths, vec!["/opt/data".to_string()]);
    }
}
