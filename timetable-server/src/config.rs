//! Process configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::cache::CacheConfig;
use crate::refresh::RefreshConfig;
use crate::scrape::{DEFAULT_SOURCE_URL, TimetableClientConfig};

#[derive(Debug, thiserror::Error)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Everything `main` needs to wire the server together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub source_url: String,
    /// Directory holding the staged CSV files
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub csv_retention: Duration,
    pub cache_ttl: Duration,
    pub cache_sweep: Duration,
    pub scrape_timeout_secs: u64,
    /// Run one refresh before serving instead of waiting for midnight
    pub refresh_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            port: 8080,
            database_url: "sqlite://data/timetable.db".to_string(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            timezone: chrono_tz::Asia::Jakarta,
            csv_retention: Duration::ZERO,
            cache_ttl: cache.ttl,
            cache_sweep: cache.sweep_interval,
            scrape_timeout_secs: 30,
            refresh_on_start: false,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            source_url: get("SOURCE_URL").unwrap_or(defaults.source_url),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            timezone: parse_or(&get, "TIMEZONE", defaults.timezone)?,
            csv_retention: secs_or(&get, "CSV_RETENTION_SECS", defaults.csv_retention)?,
            cache_ttl: secs_or(&get, "CACHE_TTL_SECS", defaults.cache_ttl)?,
            cache_sweep: secs_or(&get, "CACHE_SWEEP_SECS", defaults.cache_sweep)?,
            scrape_timeout_secs: parse_or(&get, "SCRAPE_TIMEOUT_SECS", defaults.scrape_timeout_secs)?,
            refresh_on_start: bool_or(&get, "REFRESH_ON_START", defaults.refresh_on_start)?,
        })
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig::default()
            .with_ttl(self.cache_ttl)
            .with_sweep_interval(self.cache_sweep)
    }

    pub fn client(&self) -> TimetableClientConfig {
        TimetableClientConfig::new(&self.source_url).with_timeout(self.scrape_timeout_secs)
    }

    pub fn refresh(&self) -> RefreshConfig {
        RefreshConfig::default().with_csv_retention(self.csv_retention)
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn secs_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(get, key, default.as_secs()).map(Duration::from_secs)
}

fn bool_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = get(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value,
            reason: "expected true or false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.timezone, chrono_tz::Asia::Jakarta);
        assert_eq!(config.csv_retention, Duration::ZERO);
        assert_eq!(config.cache_ttl, Duration::from_secs(21_600));
        assert_eq!(config.cache_sweep, Duration::from_secs(600));
        assert!(!config.refresh_on_start);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("PORT", "9000"),
            ("DATA_DIR", "/var/lib/jadwal"),
            ("TIMEZONE", "Asia/Makassar"),
            ("CSV_RETENTION_SECS", "86400"),
            ("REFRESH_ON_START", "yes"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/jadwal"));
        assert_eq!(config.timezone, chrono_tz::Asia::Makassar);
        assert_eq!(config.refresh().csv_retention, Duration::from_secs(86_400));
        assert!(config.refresh_on_start);
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = config(&[("PORT", "  ")]).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.key, "PORT");

        let err = config(&[("TIMEZONE", "Mars/Olympus")]).unwrap_err();
        assert_eq!(err.key, "TIMEZONE");

        let err = config(&[("REFRESH_ON_START", "maybe")]).unwrap_err();
        assert_eq!(err.key, "REFRESH_ON_START");
    }

    #[test]
    fn component_configs() {
        let config = config(&[("CACHE_TTL_SECS", "60"), ("SCRAPE_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(config.cache().ttl, Duration::from_secs(60));
        assert_eq!(config.client().timeout_secs, 5);
        assert_eq!(config.client().url, DEFAULT_SOURCE_URL);
    }
}
