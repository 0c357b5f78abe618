//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "khoomi.toml",
    "./config/config.toml",
    "/etc/khoomi/config.toml",
];

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("KHOOMI_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn set_parsed<T: FromStr>(target: &mut T, value: Option<String>) {
    if let Some(parsed) = value.and_then(|v| v.parse().ok()) {
        *target = parsed;
    }
}

fn set_string(target: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *target = v;
    }
}

/// Apply `KHOOMI_*` overrides using `lookup` as the variable source.
pub(crate) fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP
    set_parsed(&mut config.http.port, lookup("KHOOMI_HTTP_PORT"));
    set_string(&mut config.http.host, lookup("KHOOMI_HTTP_HOST"));
    if let Some(val) = lookup("KHOOMI_CORS_ORIGINS") {
        config.http.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(val) = lookup("KHOOMI_TRUSTED_PROXIES") {
        config.http.trusted_proxies = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    set_parsed(&mut config.http.max_upload_bytes, lookup("KHOOMI_MAX_UPLOAD_BYTES"));

    // MongoDB
    set_string(&mut config.mongodb.uri, lookup("KHOOMI_MONGODB_URI"));
    set_string(&mut config.mongodb.database, lookup("KHOOMI_MONGODB_DATABASE"));

    // Redis
    set_string(&mut config.redis.url, lookup("KHOOMI_REDIS_URL"));

    // Auth
    set_string(&mut config.auth.jwt_secret, lookup("KHOOMI_JWT_SECRET"));
    set_string(&mut config.auth.issuer, lookup("KHOOMI_JWT_ISSUER"));
    set_parsed(&mut config.auth.access_token_expiry_secs, lookup("KHOOMI_ACCESS_TOKEN_EXPIRY_SECS"));
    set_parsed(&mut config.auth.refresh_token_expiry_secs, lookup("KHOOMI_REFRESH_TOKEN_EXPIRY_SECS"));

    // Media host
    set_string(&mut config.media.upload_url, lookup("KHOOMI_MEDIA_UPLOAD_URL"));
    set_string(&mut config.media.destroy_url, lookup("KHOOMI_MEDIA_DESTROY_URL"));
    set_string(&mut config.media.api_key, lookup("KHOOMI_MEDIA_API_KEY"));
    set_string(&mut config.media.api_secret, lookup("KHOOMI_MEDIA_API_SECRET"));
    set_string(&mut config.media.folder, lookup("KHOOMI_MEDIA_FOLDER"));

    // SMTP
    set_parsed(&mut config.smtp.enabled, lookup("KHOOMI_SMTP_ENABLED"));
    set_string(&mut config.smtp.host, lookup("KHOOMI_SMTP_HOST"));
    set_parsed(&mut config.smtp.port, lookup("KHOOMI_SMTP_PORT"));
    set_string(&mut config.smtp.username, lookup("KHOOMI_SMTP_USERNAME"));
    set_string(&mut config.smtp.password, lookup("KHOOMI_SMTP_PASSWORD"));
    set_string(&mut config.smtp.from_address, lookup("KHOOMI_SMTP_FROM"));

    // Mail outbox
    set_parsed(&mut config.mail_outbox.poll_interval_ms, lookup("KHOOMI_MAIL_POLL_INTERVAL_MS"));
    set_parsed(&mut config.mail_outbox.max_retries, lookup("KHOOMI_MAIL_MAX_RETRIES"));

    // General
    set_string(&mut config.origin_url, lookup("KHOOMI_ORIGIN_URL"));
    set_parsed(&mut config.dev_mode, lookup("KHOOMI_DEV_MODE"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = AppConfig::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                ("KHOOMI_HTTP_PORT", "9191"),
                ("KHOOMI_MONGODB_URI", "mongodb://db:27017"),
                ("KHOOMI_JWT_SECRET", "top-secret"),
                ("KHOOMI_CORS_ORIGINS", "https://a.com, https://b.com"),
                ("KHOOMI_TRUSTED_PROXIES", "10.0.0.1, ,10.0.0.2"),
                ("KHOOMI_DEV_MODE", "true"),
            ]),
        );

        assert_eq!(config.http.port, 9191);
        assert_eq!(config.mongodb.uri, "mongodb://db:27017");
        assert_eq!(config.auth.jwt_secret, "top-secret");
        assert_eq!(config.http.cors_origins, vec!["https://a.com", "https://b.com"]);
        assert_eq!(config.http.trusted_proxies, vec!["10.0.0.1", "10.0.0.2"]);
        assert!(config.dev_mode);
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, lookup_from(&[("KHOOMI_HTTP_PORT", "not-a-port")]));
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("khoomi.toml");
        std::fs::write(&path, "origin_url = \"https://staging.khoomi.com\"\n").unwrap();

        let config = ConfigLoader::with_path(&path).load().unwrap();
        assert_eq!(config.origin_url, "https://staging.khoomi.com");
    }
}
