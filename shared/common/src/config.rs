use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("invalid value for {key}: '{value}'")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}

/// Reads `key` from the environment, falling back to `default` when unset or
/// empty. A value that is present but does not parse is an error.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    parse_setting(key, std::env::var(key).ok(), default)
}

pub fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_setting<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|_| ConfigError {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("DATABASE_HOST", "localhost"),
            port: env_or("DATABASE_PORT", 5432)?,
            username: env_string("DATABASE_USERNAME", "mentorbook_user"),
            password: env_string("DATABASE_PASSWORD", "mentorbook_password"),
            database: env_string("DATABASE_NAME", "mentorbook"),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
    pub refresh_expiration_hours: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: env_string("JWT_SECRET", "dev-secret-key-change-in-production"),
            expiration_hours: env_or("JWT_EXPIRATION_HOURS", 24)?,
            refresh_expiration_hours: env_or("JWT_REFRESH_EXPIRATION_HOURS", 168)?,
            issuer: env_string("JWT_ISSUER", "mentorbook"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("SERVER_HOST", "0.0.0.0"),
            port: env_or("SERVER_PORT", 8000)?,
            cors_origins: env_string("CORS_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_values_use_default() {
        assert_eq!(parse_setting("SERVER_PORT", None, 8000u16), Ok(8000));
        assert_eq!(parse_setting("SERVER_PORT", Some("  ".into()), 8000u16), Ok(8000));
        assert_eq!(parse_setting("SERVER_PORT", Some("9001".into()), 8000u16), Ok(9001));
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_setting("SERVER_PORT", Some("eighty".into()), 8000u16).unwrap_err();
        assert_eq!(err.key, "SERVER_PORT");
        assert_eq!(err.value, "eighty");
    }

    #[test]
    fn storage_backend_names() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("Postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn connection_string_format() {
        let config = DatabaseConfig {
            host: "db".into(),
            port: 5433,
            username: "u".into(),
            password: "p".into(),
            database: "mentorbook".into(),
            max_connections: 5,
        };
        assert_eq!(config.connection_string(), "postgresql://u:p@db:5433/mentorbook");
    }
}
