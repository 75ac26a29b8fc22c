use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which `KeyValueStore` backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
    Postgres,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "redis" => Some(StorageBackend::Redis),
            "postgres" | "postgresql" => Some(StorageBackend::Postgres),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Redis => "redis",
            StorageBackend::Postgres => "postgres",
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if the selected backend's connection URL is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub storage_backend: StorageBackend,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
    pub storage_namespace: String,
    /// Absent means the remote skill service is disabled.
    pub skill_service_url: Option<String>,
    pub skill_service_timeout: Duration,
    pub feed_page_size: u32,
    pub feed_max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            storage_backend: StorageBackend::Memory,
            redis_url: None,
            database_url: None,
            storage_namespace: "engagement".to_string(),
            skill_service_url: None,
            skill_service_timeout: Duration::from_secs(15),
            feed_page_size: 20,
            feed_max_page_size: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        let defaults = Config::default();

        let storage_backend = match optional_env("STORAGE_BACKEND") {
            Some(raw) => StorageBackend::parse(&raw)
                .with_context(|| format!("STORAGE_BACKEND '{raw}' is not one of memory, redis, postgres"))?,
            None => defaults.storage_backend,
        };

        let redis_url = match storage_backend {
            StorageBackend::Redis => Some(require_env("REDIS_URL")?),
            _ => optional_env("REDIS_URL"),
        };
        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(require_env("DATABASE_URL")?),
            _ => optional_env("DATABASE_URL"),
        };

        let feed_page_size = parse_env("FEED_PAGE_SIZE", defaults.feed_page_size)?;
        let feed_max_page_size = parse_env("FEED_MAX_PAGE_SIZE", defaults.feed_max_page_size)?;
        if feed_page_size == 0 || feed_page_size > feed_max_page_size {
            bail!("FEED_PAGE_SIZE must be between 1 and FEED_MAX_PAGE_SIZE ({feed_max_page_size})");
        }

        Ok(Config {
            port: parse_env("PORT", defaults.port)?,
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
            storage_backend,
            redis_url,
            database_url,
            storage_namespace: optional_env("STORAGE_NAMESPACE").unwrap_or(defaults.storage_namespace),
            skill_service_url: optional_env("SKILL_SERVICE_URL"),
            skill_service_timeout: Duration::from_secs(parse_env(
                "SKILL_SERVICE_TIMEOUT_SECS",
                defaults.skill_service_timeout.as_secs(),
            )?),
            feed_page_size,
            feed_max_page_size,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank both count as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
