//! Fulfillment configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `ORDER_NUMBER_MAX_ATTEMPTS` - Retries on an order-number collision
//!   before the conflict is surfaced (default: 5)

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ORDER_NUMBER_MAX_ATTEMPTS: u32 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Fulfillment configuration.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum connections in the database pool
    pub max_connections: u32,
    /// Attempts at generating a unique order number before giving up
    pub order_number_max_attempts: u32,
}

impl FulfillmentConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = SecretString::from(require_env("DATABASE_URL")?);
        let max_connections =
            parse_env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let order_number_max_attempts =
            parse_env_or("ORDER_NUMBER_MAX_ATTEMPTS", DEFAULT_ORDER_NUMBER_MAX_ATTEMPTS)?;

        Ok(Self {
            database_url,
            max_connections,
            order_number_max_attempts,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar(name.to_owned(), raw)),
        Err(_) => Ok(default),
    }
}
