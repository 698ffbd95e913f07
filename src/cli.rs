//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Typespeed - typing-speed practice backend
///
/// Serves the sign-up, sign-in, test submission and statistics API over
/// HTTP, backed by a SQLite database.
///
/// Examples:
///   typespeed --bind 127.0.0.1:8080 --database ./typespeed.db
///   TYPESPEED_ACCESS_SECRET=... TYPESPEED_REFRESH_SECRET=... typespeed
///   typespeed --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Address to listen on (overrides [server] bind)
    #[arg(short, long, value_name = "ADDR", env = "TYPESPEED_BIND")]
    pub bind: Option<String>,

    /// SQLite database file (overrides [database] path)
    #[arg(short, long, value_name = "FILE", env = "TYPESPEED_DATABASE")]
    pub database: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .typespeed.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Secret used to sign access tokens
    #[arg(long, env = "TYPESPEED_ACCESS_SECRET", hide_env_values = true)]
    pub access_secret: Option<String>,

    /// Secret used to sign refresh tokens
    #[arg(long, env = "TYPESPEED_REFRESH_SECRET", hide_env_values = true)]
    pub refresh_secret: Option<String>,

    /// Allowed CORS origins (comma-separated)
    #[arg(long, value_name = "ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Directory for the daily JSON request log (disabled when unset)
    #[arg(long, value_name = "DIR", env = "TYPESPEED_REQUEST_LOG_DIR")]
    pub request_log_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .typespeed.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref bind) = self.bind {
            if bind.parse::<std::net::SocketAddr>().is_err() {
                return Err(format!("Bind address must be HOST:PORT, got '{}'", bind));
            }
        }

        if let Some(ref origins) = self.cors_origins {
            if let Some(bad) = origins
                .iter()
                .find(|o| !o.starts_with("http://") && !o.starts_with("https://"))
            {
                return Err(format!(
                    "CORS origin must start with 'http://' or 'https://': {}",
                    bad
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            bind: None,
            database: None,
            config: None,
            access_secret: None,
            refresh_secret: None,
            cors_origins: None,
            request_log_dir: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_bind_address() {
        let mut args = make_args();
        args.bind = Some("127.0.0.1:8080".to_string());
        assert!(args.validate().is_ok());

        args.bind = Some("localhost".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_cors_origins() {
        let mut args = make_args();
        args.cors_origins = Some(vec!["ftp://example.com".to_string()]);
        assert!(args.validate().is_err());

        args.cors_origins = Some(vec!["https://example.com".to_string()]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "typespeed",
            "--bind",
            "127.0.0.1:9999",
            "--cors-origins",
            "http://a.test,https://b.test",
            "--request-log-dir",
            "/var/log/typespeed",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.bind.as_deref(), Some("127.0.0.1:9999"));
        assert_eq!(
            args.cors_origins,
            Some(vec!["http://a.test".to_string(), "https://b.test".to_string()])
        );
        assert_eq!(
            args.request_log_dir,
            Some(PathBuf::from("/var/log/typespeed"))
        );
        assert!(args.verbose);
    }
}
