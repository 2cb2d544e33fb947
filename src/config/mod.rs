//! Configuration management for the préstamos back office
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::sequence::RetryPolicy;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,

    /// CORS allowed origins (comma separated)
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Shared secret used to verify bearer tokens minted by the auth provider
    pub jwt_secret: String,

    /// Total insert attempts when a receipt or invoice number collides
    pub receipt_retry_attempts: u32,

    /// Pause between colliding insert attempts, in milliseconds
    pub receipt_retry_delay_ms: u64,

    /// Days between disbursement and the default due date
    pub loan_default_term_days: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|v| parse_flag(&v))
            .unwrap_or(Ok(true))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            Err(_) => "development-secret-change-in-production".to_string(),
        };

        let receipt_retry_attempts = env::var("RECEIPT_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5)
            .max(1);

        let receipt_retry_delay_ms = env::var("RECEIPT_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "50".to_string())
            .parse::<u64>()
            .unwrap_or(50);

        let loan_default_term_days = env::var("LOAN_DEFAULT_TERM_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue("LOAN_DEFAULT_TERM_DAYS must be a number".to_string())
            })?;

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            run_migrations,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            receipt_retry_attempts,
            receipt_retry_delay_ms,
            loan_default_term_days,
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.receipt_retry_delay_ms)
    }

    /// Bounded retry applied to receipt and invoice inserts
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.receipt_retry_attempts, self.retry_delay())
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "Expected a boolean flag, got '{}'",
            other
        ))),
    }
}
