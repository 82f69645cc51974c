//! Job configuration.
//!
//! Values come from, in increasing priority: built-in defaults, the TOML
//! file (`-c PATH` or the per-user config directory), and `GAMESALES_*`
//! environment variables.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

pub mod year;

pub use year::target_year;

pub const DEFAULT_SOURCE_URL: &str =
    "https://kc-course-static.hb.ru-msk.vkcs.cloud/startda/Video%20Game%20Sales.csv";

/// Get the per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "gamesales", "gamesales")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobConfig {
    pub job: JobSettings,
    pub schedule: ScheduleSettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub owner: String,
    /// Seed the target year is derived from
    pub year_seed: String,
    /// Explicit target year, bypassing the seed
    pub year: Option<i32>,
    pub source_url: String,
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    pub log_level: Option<String>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            owner: "mi_sozonov".to_string(),
            year_seed: "mi-sozonov".to_string(),
            year: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            http_timeout: Duration::from_secs(60),
            log_level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Daily trigger in `minute hour * * *` form
    pub cron: String,
    /// No run fires before this date
    pub start_date: NaiveDate,
    /// Replaying missed runs is not supported; must stay `false`
    pub catchup: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            cron: "0 15 * * *".to_string(),
            start_date: NaiveDate::from_ymd_opt(2021, 10, 7).unwrap_or_default(),
            catchup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Policy for a whole run
    pub run: RetryConfig,
    /// Policy for the data fetch step
    pub fetch: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            run: RetryConfig::fixed(2, Duration::from_secs(5 * 60)),
            fetch: RetryConfig::fixed(4, Duration::from_secs(10)),
        }
    }
}

impl JobConfig {
    /// Load from `path`, or from the per-user config file when no path is
    /// given, then apply environment overrides and validate.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path).await?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn merge_env_vars(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply `GAMESALES_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GAMESALES_SOURCE_URL") {
            self.job.source_url = url;
        }

        if let Some(seed) = lookup("GAMESALES_YEAR_SEED") {
            self.job.year_seed = seed;
        }

        if let Some(year) = lookup("GAMESALES_YEAR") {
            match year.trim().parse::<i32>() {
                Ok(value) => self.job.year = Some(value),
                Err(_) => warn!("Ignoring invalid GAMESALES_YEAR value {:?}", year),
            }
        }

        if let Some(level) = lookup("GAMESALES_LOG_LEVEL") {
            self.job.log_level = Some(level);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.job.source_url.trim().is_empty() {
            return Err(Error::Config("job.source_url must not be empty".to_string()));
        }
        if self.job.year.is_none() && self.job.year_seed.is_empty() {
            return Err(Error::Config(
                "job.year_seed must not be empty when job.year is unset".to_string(),
            ));
        }
        if self.schedule.catchup {
            return Err(Error::Config(
                "schedule.catchup is not supported; missed runs are never replayed".to_string(),
            ));
        }
        for (name, policy) in [("run", &self.retry.run), ("fetch", &self.retry.fetch)] {
            if policy.attempts == 0 {
                return Err(Error::Config(format!(
                    "retry.{name}.attempts must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// The year every rule and the report use.
    pub fn target_year(&self) -> i32 {
        self.job
            .year
            .unwrap_or_else(|| target_year(&self.job.year_seed))
    }
}
