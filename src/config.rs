use config::{Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// Settings for the external session provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Hostname of the provider this instance fronts.
    pub hostname: String,
    /// Whether a freshly created session runs an initial sync before the
    /// login is considered successful.
    pub initial_sync: bool,
}

/// A development account served by the in-memory provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevAccount {
    pub username: String,
    pub password: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub provider: ProviderConfig,
    /// Accounts for the dev provider. Empty when a real provider is wired in.
    pub accounts: Vec<DevAccount>,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            // Server defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3333)?
            // Provider defaults
            .set_default("provider.hostname", "localhost")?
            .set_default("provider.initial_sync", true)?
            .set_default("accounts", Vec::<String>::new())?
            // Log defaults
            .set_default("log.level", "info")?;

        // Add configuration from file
        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // Add environment variables with prefix
        // e.g. `MAILGATE_SERVER__PORT=...` would override `server.port`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILGATE")
                .separator("__")
                .ignore_empty(true),
        );

        // Build the config and deserialize it into Settings
        Ok(config_builder.build()?.try_deserialize()?)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3333,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            initial_sync: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log: LogConfig::default(),
            provider: ProviderConfig::default(),
            accounts: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}
