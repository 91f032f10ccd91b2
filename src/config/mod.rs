//! Configuration management
//!
//! This module handles loading and parsing configuration for the Sayings service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token issuing configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Content listing configuration
    #[serde(default)]
    pub content: ContentConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/sayings.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Longest accepted token lifetime, in days
pub const MAX_TOKEN_EXPIRATION_DAYS: i64 = 3650;

/// Bearer token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token lifetime in days
    #[serde(default = "default_token_expiration_days")]
    pub token_expiration_days: i64,
    /// Admin account created or promoted at start-up
    #[serde(default)]
    pub admin: Option<AdminBootstrap>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expiration_days: default_token_expiration_days(),
            admin: None,
        }
    }
}

/// Credentials of the start-up admin account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_jwt_secret() -> String {
    "dev-secret-change-me".to_string()
}

fn default_token_expiration_days() -> i64 {
    7
}

/// Content listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Page size used when the caller does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Upper bound on any requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Insert the built-in approved sayings when the content table is empty
    #[serde(default = "default_seed_defaults")]
    pub seed_defaults: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            seed_defaults: default_seed_defaults(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_seed_defaults() -> bool {
    true
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - SAYINGS_SERVER_HOST
    /// - SAYINGS_SERVER_PORT
    /// - SAYINGS_SERVER_CORS_ORIGIN
    /// - SAYINGS_DATABASE_DRIVER
    /// - SAYINGS_DATABASE_URL
    /// - SAYINGS_AUTH_JWT_SECRET
    /// - SAYINGS_AUTH_TOKEN_EXPIRATION_DAYS
    /// - SAYINGS_CONTENT_MAX_PAGE_SIZE
    /// - SAYINGS_ADMIN_EMAIL / SAYINGS_ADMIN_PASSWORD (both required)
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_TOKEN_EXPIRATION_DAYS).contains(&self.auth.token_expiration_days) {
            return Err(ConfigError::ValidationError(format!(
                "auth.token_expiration_days must be between 1 and {}",
                MAX_TOKEN_EXPIRATION_DAYS
            )));
        }
        if self.content.default_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "content.default_page_size must be at least 1".to_string(),
            ));
        }
        if self.content.default_page_size > self.content.max_page_size {
            return Err(ConfigError::ValidationError(format!(
                "content.default_page_size ({}) exceeds content.max_page_size ({})",
                self.content.default_page_size, self.content.max_page_size
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SAYINGS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SAYINGS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("SAYINGS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("SAYINGS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("SAYINGS_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("SAYINGS_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(days) = std::env::var("SAYINGS_AUTH_TOKEN_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.token_expiration_days = days;
            }
        }

        if let Ok(max) = std::env::var("SAYINGS_CONTENT_MAX_PAGE_SIZE") {
            if let Ok(max) = max.parse::<u32>() {
                self.content.max_page_size = max;
            }
        }

        if let (Ok(email), Ok(password)) = (
            std::env::var("SAYINGS_ADMIN_EMAIL"),
            std::env::var("SAYINGS_ADMIN_PASSWORD"),
        ) {
            self.auth.admin = Some(AdminBootstrap {
                email,
                password,
                name: default_admin_name(),
            });
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches SAYINGS_* environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
