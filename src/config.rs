use std::{str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub max_connections: u32,
}

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 366 * 24 * 60;

#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// Fixed signing secret. When absent a random one is generated per process.
    pub secret: Option<String>,
    pub ttl_minutes: i64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

impl TokenConfig {
    /// Token lifetime, or `None` when `ttl_minutes` is outside
    /// `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn ttl(&self) -> Option<Duration> {
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.ttl_minutes) {
            return None;
        }
        let secs = u64::try_from(self.ttl_minutes).ok()?.checked_mul(60)?;
        Some(Duration::from_secs(secs))
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL").ok();
        let password = std::env::var("POSTGRES_PASSWORD").ok();
        if url.is_none() && password.is_none() {
            anyhow::bail!("either DATABASE_URL or POSTGRES_PASSWORD must be set");
        }

        let database = DatabaseConfig {
            url,
            host: std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".into()),
            port: parse_var("POSTGRES_PORT", 5432)?,
            user: std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".into()),
            password,
            name: std::env::var("POSTGRES_DB").unwrap_or_else(|_| "postgres".into()),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let token = TokenConfig {
            secret: std::env::var("TOKEN_SECRET").ok().filter(|s| !s.is_empty()),
            ttl_minutes: parse_var("TOKEN_TTL_MINUTES", 24 * 60)?,
        };
        token.ttl().with_context(|| {
            format!("TOKEN_TTL_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}")
        })?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_var("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("APP_PORT", 3000)?,
            database,
            token,
            password,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
