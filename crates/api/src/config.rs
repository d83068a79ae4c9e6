//! Application configuration

use std::env;

use crate::auth::DEFAULT_TOKEN_TIMEOUT_DAYS;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database (in-memory user directory when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // `username:password_hash` lines seeding the in-memory directory
    pub users_file: Option<String>,

    // Redis (in-memory nonce store when unset)
    pub redis_url: Option<String>,

    // Authentication
    pub secret_key: String,
    pub token_timeout_days: u32,
    pub token_cookie_secure: bool,

    // Logging
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            users_file: env::var("USERS_FILE").ok().filter(|path| !path.is_empty()),

            // Redis
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),

            // Authentication
            secret_key: {
                let secret =
                    env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?;
                // Token digests are only as strong as this key
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "SECRET_KEY must be at least 32 characters",
                    ));
                }
                if secret.chars().all(|c| c == secret.chars().next().unwrap_or(c)) {
                    return Err(ConfigError::WeakSecret(
                        "SECRET_KEY must not repeat a single character",
                    ));
                }
                secret
            },
            token_timeout_days: match env::var("TOKEN_TIMEOUT_DAYS") {
                Err(_) => DEFAULT_TOKEN_TIMEOUT_DAYS,
                Ok(raw) => match raw.trim().parse::<u32>() {
                    Ok(days) if days > 0 => days,
                    _ => {
                        return Err(ConfigError::Invalid(
                            "TOKEN_TIMEOUT_DAYS must be a positive integer",
                        ))
                    }
                },
            },
            token_cookie_secure: env::var("TOKEN_COOKIE_SECURE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "BIND_ADDRESS",
        "DATABASE_URL",
        "USERS_FILE",
        "REDIS_URL",
        "SECRET_KEY",
        "TOKEN_TIMEOUT_DAYS",
        "TOKEN_COOKIE_SECURE",
        "LOG_FORMAT",
    ];

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn setup_minimal_config() {
        cleanup_config();
        env::set_var("SECRET_KEY", "test-secret-must-be-at-least-32-characters");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.token_timeout_days, 7);
        assert!(config.database_url.is_none());
        assert!(config.users_file.is_none());
        assert!(config.redis_url.is_none());
        assert!(config.token_cookie_secure);
        assert!(!config.log_json);

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_secret_key_validation() {
        cleanup_config();
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("SECRET_KEY"))
        ));

        env::set_var("SECRET_KEY", "too-short");
        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        env::set_var("SECRET_KEY", "x".repeat(40));
        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_token_timeout_days() {
        setup_minimal_config();

        env::set_var("TOKEN_TIMEOUT_DAYS", "14");
        assert_eq!(Config::from_env().unwrap().token_timeout_days, 14);

        env::set_var("TOKEN_TIMEOUT_DAYS", "0");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        env::set_var("TOKEN_TIMEOUT_DAYS", "seven");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_optional_backends() {
        setup_minimal_config();
        env::set_var("DATABASE_URL", "postgres://localhost/gluten");
        env::set_var("USERS_FILE", "/etc/gluten/users");
        env::set_var("REDIS_URL", "");
        env::set_var("LOG_FORMAT", "JSON");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/gluten")
        );
        assert_eq!(config.users_file.as_deref(), Some("/etc/gluten/users"));
        assert!(config.redis_url.is_none());
        assert!(config.log_json);

        cleanup_config();
    }
}
