use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MySql,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::MySql),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow!("unknown STORAGE_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub class_seed_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    // Cache
    pub cache_max_capacity: u64,
    pub cache_default_ttl: Duration,
    pub overview_filtered_ttl: Duration,
    pub overview_full_ttl: Duration,

    pub log_level: tracing::Level,
}

/// Read `key`, falling back to `default`, and parse it.
fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{} has invalid value {:?}: {}", key, raw, e))
}

fn seconds(key: &str, default: &str) -> Result<Duration> {
    parsed::<u64>(key, default).map(Duration::from_secs)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let storage_backend: StorageBackend = parsed("STORAGE_BACKEND", "mysql")?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::MySql && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set for the mysql backend"));
        }

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            storage_backend,
            database_url,
            class_seed_path: env::var("CLASS_SEED_PATH").ok().map(PathBuf::from),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            cache_max_capacity: parsed("CACHE_MAX_CAPACITY", "10000")?,
            cache_default_ttl: seconds("CACHE_DEFAULT_TTL", "300")?, // 5 min
            overview_filtered_ttl: seconds("OVERVIEW_FILTERED_TTL", "300")?,
            overview_full_ttl: seconds("OVERVIEW_FULL_TTL", "900")?, // 15 min

            log_level: parsed("LOG_LEVEL", "debug")?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            class_seed_path: None,
            jwt_secret: "test-secret".to_string(),
            api_prefix: "/api".to_string(),
            rate_protected_per_min: 1000,
            cache_max_capacity: 1000,
            cache_default_ttl: Duration::from_secs(300),
            overview_filtered_ttl: Duration::from_secs(300),
            overview_full_ttl: Duration::from_secs(900),
            log_level: tracing::Level::DEBUG,
        }
    }
}
