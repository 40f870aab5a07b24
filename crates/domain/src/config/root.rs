use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::resolver::ResolverConfig;

const LOCAL_CONFIG: &str = "ferrous-resolv.toml";
const SYSTEM_CONFIG: &str = "/etc/ferrous-resolv/config.toml";

/// Main configuration structure for ferrous-resolv
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Nameservers, timeouts and lookup behaviour
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-resolv.toml in current directory
    /// 3. /etc/ferrous-resolv/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(path) = Self::get_config_path() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// Load configuration from a specific file
    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply command-line overrides to configuration
    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if !overrides.servers.is_empty() {
            self.resolver.servers = overrides.servers;
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.resolver.timeout_ms = timeout;
            self.resolver.max_timeout_ms = self.resolver.max_timeout_ms.max(timeout);
        }
        if let Some(tries) = overrides.tries {
            self.resolver.tries = tries;
        }
        if overrides.use_tcp {
            self.resolver.flags.use_tcp = true;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolver.validate()
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        if std::path::Path::new(LOCAL_CONFIG).exists() {
            Some(LOCAL_CONFIG.to_string())
        } else if std::path::Path::new(SYSTEM_CONFIG).exists() {
            Some(SYSTEM_CONFIG.to_string())
        } else {
            None
        }
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub servers: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub tries: Option<u32>,
    pub use_tcp: bool,
    pub log_level: Option<String>,
}
