use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result, anyhow};
use tracing::Level;

#[derive(Clone)]
pub struct Config {
    /// Unset runs the in-process store; nothing survives a restart.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub log_dir: String,
    pub log_level: Level,

    pub project_cache_ttl_secs: u64,

    /// Seeds the first admin when the user table is empty.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: var("DATABASE_URL"),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "10")?,
            jwt_secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            server_addr: try_load("SERVER_ADDR", "127.0.0.1:8080")?,
            access_token_ttl: try_load("ACCESS_TOKEN_TTL", "900")?, // default 15 min
            refresh_token_ttl: try_load("REFRESH_TOKEN_TTL", "604800")?, // default 7 days

            rate_login_per_min: try_load("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: try_load("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: try_load("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: try_load("API_PREFIX", "/api")?,

            log_dir: try_load("LOG_DIR", "logs")?,
            log_level: try_load("LOG_LEVEL", "info")?,

            project_cache_ttl_secs: try_load("PROJECT_CACHE_TTL_SECS", "300")?,

            admin_username: var("ADMIN_USERNAME"),
            admin_password: var("ADMIN_PASSWORD"),
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_protected_per_min: 6000,
            api_prefix: "/api".to_string(),
            log_dir: "logs".to_string(),
            log_level: Level::DEBUG,
            project_cache_ttl_secs: 60,
            admin_username: None,
            admin_password: None,
        }
    }
}
