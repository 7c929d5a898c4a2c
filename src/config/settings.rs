use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sandbox::{
    DEFAULT_MAX_MEMORY_BYTES, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_MS, ExecutionRequest,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub limits: LimitsConfig,
    pub behavior: BehaviorConfig,
    pub secrets: SecretsConfig,
}

/// Resource bounds applied to every sandboxed execution
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub timeout_ms: u64,
    pub max_memory_bytes: u64,
    pub max_output_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BehaviorConfig {
    /// When set, every destructive action short-circuits to preview-only.
    pub dry_run: bool,
    pub confirm_destructive: bool,
    pub log_commands: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecretsConfig {
    pub service: String,
    pub account: String,
    pub api_key_env: String,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("execguard"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Config file not found",
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Validate before saving
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self)?;

        fs::write(&path, contents)?;

        // Set permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            limits: LimitsConfig {
                timeout_ms: DEFAULT_TIMEOUT_MS,
                max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES as u64,
            },
            behavior: BehaviorConfig {
                dry_run: false,
                confirm_destructive: true,
                log_commands: true,
            },
            secrets: SecretsConfig {
                service: "execguard".to_string(),
                account: "llm-api-key".to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
            },
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_memory_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max_memory_bytes must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_output_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max_output_bytes must be greater than 0".to_string(),
            ));
        }

        if self.secrets.api_key_env.is_empty() {
            return Err(ConfigError::InvalidValue(
                "api_key_env must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Build an execution request carrying the configured limits
    pub fn execution_request<P: AsRef<Path>>(&self, command: &str, working_dir: P) -> ExecutionRequest {
        ExecutionRequest::new(command, working_dir)
            .with_timeout(Duration::from_millis(self.limits.timeout_ms))
            .with_max_memory_bytes(self.limits.max_memory_bytes)
            .with_max_output_bytes(self.limits.max_output_bytes as usize)
    }
}
