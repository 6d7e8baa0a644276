use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use log::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(String),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            jwt_secret: read_secret("JWT_SECRET")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn require(key: &str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &raw)
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Environment first, then the docker secret file.
fn read_secret(secret_name: &str) -> Result<String, ConfigError> {
    if let Some(value) = var(secret_name) {
        return Ok(value);
    }

    let path = format!("/run/secrets/{secret_name}");
    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            ConfigError::Missing(secret_name.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_whitespace() {
        let value: u32 = parse("DATABASE_MAX_CONNECTIONS", " 12 ").unwrap();
        assert_eq!(value, 12);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let error = parse::<u32>("DATABASE_MAX_CONNECTIONS", "many").unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { .. }));
    }
}
