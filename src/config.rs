//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.typespeed.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".typespeed.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token signing settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Statistics and leaderboard settings.
    #[serde(default)]
    pub stats: StatsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by CORS, matched exactly.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Origin suffixes allowed by CORS (e.g. ".vercel.app"), HTTPS only.
    #[serde(default = "default_cors_suffixes")]
    pub cors_origin_suffixes: Vec<String>,

    /// Seconds to wait for in-flight requests on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,

    /// Mark the refresh cookie `Secure; SameSite=None` so browsers send it
    /// from cross-site HTTPS frontends. Requires serving over HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
            cors_origin_suffixes: default_cors_suffixes(),
            shutdown_grace_seconds: default_shutdown_grace(),
            secure_cookies: false,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_cors_suffixes() -> Vec<String> {
    vec![".vercel.app".to_string()]
}

fn default_shutdown_grace() -> u64 {
    10
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("typespeed.db")
}

/// Token signing settings.
///
/// Secrets are empty by default; the server refuses to start until they
/// are set here or through the environment.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret for access tokens.
    #[serde(default)]
    pub access_secret: String,

    /// Secret for refresh tokens.
    #[serde(default)]
    pub refresh_secret: String,

    /// Access token lifetime in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,

    /// Refresh token lifetime in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,

    /// bcrypt work factor for new password hashes (4-31).
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &redact(&self.access_secret))
            .field("refresh_secret", &redact(&self.refresh_secret))
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_hours", &self.refresh_ttl_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_hours: default_refresh_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    24 * 7
}

fn default_bcrypt_cost() -> u32 {
    crate::auth::DEFAULT_COST
}

/// Longest accepted access token lifetime (one day).
pub const MAX_ACCESS_TTL_MINUTES: u64 = 24 * 60;

/// Longest accepted refresh token lifetime (one year).
pub const MAX_REFRESH_TTL_HOURS: u64 = 24 * 365;

const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

/// Statistics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Rows returned by the top-performer leaderboard.
    #[serde(default = "default_top_performers")]
    pub top_performers: usize,

    /// Attempts at the read-fold-write cycle before a submission fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Length of the generated practice string.
    #[serde(default = "default_sentence_len")]
    pub sentence_length: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_performers: default_top_performers(),
            max_retries: default_max_retries(),
            sentence_length: default_sentence_len(),
        }
    }
}

fn default_top_performers() -> usize {
    10
}

fn default_max_retries() -> usize {
    5
}

fn default_sentence_len() -> usize {
    150
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment fallbacks) take precedence
    /// over config file settings, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(ref path) = args.database {
            self.database.path = path.clone();
        }
        if let Some(ref secret) = args.access_secret {
            self.auth.access_secret = secret.clone();
        }
        if let Some(ref secret) = args.refresh_secret {
            self.auth.refresh_secret = secret.clone();
        }
        if let Some(ref origins) = args.cors_origins {
            self.server.cors_origins = origins.clone();
        }
    }

    /// Check settings that have no safe default.
    pub fn validate(&self) -> Result<()> {
        if self.auth.access_secret.is_empty() || self.auth.refresh_secret.is_empty() {
            bail!(
                "Token secrets are not configured; set [auth] access_secret/refresh_secret \
                 or TYPESPEED_ACCESS_SECRET/TYPESPEED_REFRESH_SECRET"
            );
        }
        if self.auth.access_secret == self.auth.refresh_secret {
            bail!("Access and refresh secrets must differ");
        }
        if self.auth.access_ttl_minutes == 0 || self.auth.access_ttl_minutes > MAX_ACCESS_TTL_MINUTES {
            bail!(
                "auth.access_ttl_minutes must be between 1 and {}",
                MAX_ACCESS_TTL_MINUTES
            );
        }
        if self.auth.refresh_ttl_hours == 0 || self.auth.refresh_ttl_hours > MAX_REFRESH_TTL_HOURS {
            bail!(
                "auth.refresh_ttl_hours must be between 1 and {}",
                MAX_REFRESH_TTL_HOURS
            );
        }
        if !BCRYPT_COSTS.contains(&self.auth.bcrypt_cost) {
            bail!(
                "auth.bcrypt_cost must be between {} and {}",
                BCRYPT_COSTS.start(),
                BCRYPT_COSTS.end()
            );
        }
        if self.stats.max_retries == 0 {
            bail!("stats.max_retries must be at least 1");
        }
        if self.stats.top_performers == 0 {
            bail!("stats.top_performers must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secrets() -> Config {
        let mut config = Config::default();
        config.auth.access_secret = "a".to_string();
        config.auth.refresh_secret = "r".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.stats.top_performers, 10);
        assert_eq!(config.stats.sentence_length, 150);
        assert_eq!(config.auth.refresh_ttl_hours, 168);
        assert!(config
            .server
            .cors_origins
            .contains(&"http://localhost:5173".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
bind = "127.0.0.1:9000"
cors_origins = ["https://typing.example.com"]
secure_cookies = true

[database]
path = "/var/lib/typespeed/data.db"

[auth]
access_secret = "alpha"
refresh_secret = "beta"
access_ttl_minutes = 5

[stats]
max_retries = 12
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.cors_origins, vec!["https://typing.example.com"]);
        assert_eq!(config.server.cors_origin_suffixes, vec![".vercel.app"]);
        assert!(config.server.secure_cookies);
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/typespeed/data.db")
        );
        assert_eq!(config.auth.access_secret, "alpha");
        assert_eq!(config.auth.access_ttl_minutes, 5);
        assert_eq!(config.auth.refresh_ttl_hours, 168);
        assert_eq!(config.stats.max_retries, 12);
        assert_eq!(config.stats.top_performers, 10);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[auth]"));
        assert!(toml_str.contains("[stats]"));
    }

    #[test]
    fn test_validate_requires_secrets() {
        assert!(Config::default().validate().is_err());
        assert!(with_secrets().validate().is_ok());

        let mut same = with_secrets();
        same.auth.refresh_secret = "a".to_string();
        assert!(same.validate().is_err());

        let mut no_retries = with_secrets();
        no_retries.stats.max_retries = 0;
        assert!(no_retries.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_token_lifetimes() {
        let mut long_access = with_secrets();
        long_access.auth.access_ttl_minutes = u64::MAX;
        assert!(long_access.validate().is_err());

        let mut long_refresh = with_secrets();
        long_refresh.auth.refresh_ttl_hours = MAX_REFRESH_TTL_HOURS + 1;
        assert!(long_refresh.validate().is_err());

        let mut zero = with_secrets();
        zero.auth.access_ttl_minutes = 0;
        assert!(zero.validate().is_err());

        let mut at_limit = with_secrets();
        at_limit.auth.access_ttl_minutes = MAX_ACCESS_TTL_MINUTES;
        at_limit.auth.refresh_ttl_hours = MAX_REFRESH_TTL_HOURS;
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_validate_bcrypt_cost() {
        assert_eq!(Config::default().auth.bcrypt_cost, 10);

        let mut weak = with_secrets();
        weak.auth.bcrypt_cost = 3;
        assert!(weak.validate().is_err());

        let mut absurd = with_secrets();
        absurd.auth.bcrypt_cost = 32;
        assert!(absurd.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", with_secrets().auth);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"a\""));
    }
}
