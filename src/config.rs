use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use time::UtcOffset;

use crate::day::DayCutoff;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Day boundary settings shared by the server and the sync client.
#[derive(Debug, Clone, Copy)]
pub struct DayConfig {
    pub cutoff: DayCutoff,
    pub utc_offset: UtcOffset,
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            cutoff: DayCutoff::MIDNIGHT,
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl DayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let hour = env_parse::<u8>("DAY_CUTOFF_HOUR")?.unwrap_or(0);
        let minute = env_parse::<u8>("DAY_CUTOFF_MINUTE")?.unwrap_or(0);
        let offset_minutes = env_parse::<i32>("UTC_OFFSET_MINUTES")?.unwrap_or(0);
        Ok(Self {
            cutoff: DayCutoff::new(hour, minute)?,
            utc_offset: UtcOffset::from_whole_seconds(offset_minutes * 60)
                .context("UTC_OFFSET_MINUTES out of range")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub day: DayConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "bodyos".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "bodyos-users".into()),
        };
        let day = DayConfig::from_env()?;
        Ok(Self {
            database_url,
            jwt,
            day,
        })
    }
}

/// Settings for the client-side sync core.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub day: DayConfig,
    /// Upper bound on a remote mutation; expiry rolls the optimistic update back.
    pub mutation_timeout: Duration,
    /// Fetch the day from the server after every settled mutation.
    pub refresh_on_settle: bool,
    pub mirror_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/v1".into(),
            day: DayConfig::default(),
            mutation_timeout: Duration::from_secs(15),
            refresh_on_settle: true,
            mirror_path: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_base_url: std::env::var("BODYOS_API_URL").unwrap_or(defaults.api_base_url),
            day: DayConfig::from_env()?,
            mutation_timeout: env_parse::<u64>("BODYOS_MUTATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.mutation_timeout),
            refresh_on_settle: env_parse::<bool>("BODYOS_REFRESH_ON_SETTLE")?
                .unwrap_or(defaults.refresh_on_settle),
            mirror_path: std::env::var("BODYOS_MIRROR_PATH").ok().map(PathBuf::from),
        })
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_defaults_refresh_and_bound_mutations() {
        let cfg = SyncConfig::default();
        assert!(cfg.refresh_on_settle);
        assert_eq!(cfg.mutation_timeout, Duration::from_secs(15));
        assert!(cfg.mirror_path.is_none());
        assert_eq!(cfg.day.cutoff, DayCutoff::MIDNIGHT);
    }

    #[test]
    fn env_parse_reports_bad_values() {
        std::env::set_var("BODYOS_TEST_BAD_NUMBER", "twelve");
        let err = env_parse::<u64>("BODYOS_TEST_BAD_NUMBER").unwrap_err();
        assert!(err.to_string().contains("BODYOS_TEST_BAD_NUMBER"));
        assert!(env_parse::<u64>("BODYOS_TEST_UNSET_NUMBER").unwrap().is_none());
    }
}
