//! Khoomi Configuration
//!
//! TOML-based configuration with `KHOOMI_*` environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub smtp: SmtpConfig,
    pub mail_outbox: MailOutboxConfig,
    pub deadlines: DeadlineConfig,

    /// Canonical public origin used to build links in emails
    pub origin_url: String,

    /// Enable development mode (in-memory token store, log-only mailer)
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            mongodb: MongoConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
            smtp: SmtpConfig::default(),
            mail_outbox: MailOutboxConfig::default(),
            deadlines: DeadlineConfig::default(),
            origin_url: "https://khoomi.com".to_string(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    /// Reverse proxies allowed to set X-Forwarded-For / X-Real-IP
    pub trusted_proxies: Vec<String>,
    /// Upper bound for multipart bodies (shop and listing creation)
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["https://khoomi.com".to_string()],
            trusted_proxies: Vec::new(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true".to_string(),
            database: "khoomi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Key prefix for revoked access tokens
    pub revocation_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            revocation_prefix: "khoomi:revoked:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub secure_code_expiry_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "khoomi".to_string(),
            access_token_expiry_secs: 3600,
            refresh_token_expiry_secs: 7 * 24 * 3600,
            secure_code_expiry_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub upload_url: String,
    pub destroy_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://api.cloudinary.com/v1_1/khoomi/image/upload".to_string(),
            destroy_url: "https://api.cloudinary.com/v1_1/khoomi/image/destroy".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "khoomi".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// When false, mail is rendered and logged instead of delivered
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "Khoomi <no-reply@khoomi.com>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailOutboxConfig {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_retries: u32,
    /// In-progress rows older than this are handed back to the queue
    pub stuck_timeout_secs: i64,
}

impl Default for MailOutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 25,
            max_retries: 5,
            stuck_timeout_secs: 300,
        }
    }
}

/// Per-request deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    pub default_secs: u64,
    pub long_write_secs: u64,
    pub listing_create_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            default_secs: 30,
            long_write_secs: 100,
            listing_create_secs: 50,
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from the first config file found, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Reject configurations that cannot run outside development.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() && !self.dev_mode {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must be set (KHOOMI_JWT_SECRET)".to_string(),
            ));
        }
        if self.auth.access_token_expiry_secs <= 0 || self.auth.refresh_token_expiry_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.auth.refresh_token_expiry_secs <= self.auth.access_token_expiry_secs {
            return Err(ConfigError::ValidationError(
                "refresh tokens must outlive access tokens".to_string(),
            ));
        }
        if self.smtp.enabled && self.smtp.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "smtp.host is required when smtp is enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn example_toml() -> String {
        r#"# Khoomi Configuration
# Environment variables (KHOOMI_*) override these settings

origin_url = "https://khoomi.com"
dev_mode = false

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["https://khoomi.com"]
# Only these peers may set X-Forwarded-For / X-Real-IP
trusted_proxies = []
max_upload_bytes = 20971520

[mongodb]
uri = "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true"
database = "khoomi"

[redis]
url = "redis://localhost:6379"
revocation_prefix = "khoomi:revoked:"

[auth]
jwt_secret = ""
issuer = "khoomi"
access_token_expiry_secs = 3600
refresh_token_expiry_secs = 604800
secure_code_expiry_secs = 3600

[media]
upload_url = "https://api.cloudinary.com/v1_1/khoomi/image/upload"
destroy_url = "https://api.cloudinary.com/v1_1/khoomi/image/destroy"
api_key = ""
api_secret = ""
folder = "khoomi"
timeout_secs = 30

[smtp]
enabled = false
host = "smtp.gmail.com"
port = 587
username = ""
password = ""
from_address = "Khoomi <no-reply@khoomi.com>"

[mail_outbox]
poll_interval_ms = 1000
batch_size = 25
max_retries = 5
stuck_timeout_secs = 300

[deadlines]
default_secs = 30
long_write_secs = 100
listing_create_secs = 50
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.mongodb.database, "khoomi");
        assert_eq!(config.deadlines.default_secs, 30);
        assert_eq!(config.deadlines.long_write_secs, 100);
        assert_eq!(config.deadlines.listing_create_secs, 50);
        assert_eq!(config.origin_url, "https://khoomi.com");
    }

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.auth.issuer, "khoomi");
        assert_eq!(config.mail_outbox.max_retries, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 9000\n\n[auth]\njwt_secret = \"s3cret\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.access_token_expiry_secs, 3600);
    }

    #[test]
    fn test_validate_requires_secret_outside_dev() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.dev_mode = true;
        assert!(config.validate().is_ok());

        config.dev_mode = false;
        config.auth.jwt_secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_token_lifetimes() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "secret".to_string();
        config.auth.refresh_token_expiry_secs = 60;
        assert!(config.validate().is_err());
    }
}
