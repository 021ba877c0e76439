use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{plog_debug, Error, Result};

pub const DEFAULT_RECENCY_WINDOW_MS: u64 = 10_000;
pub const DEFAULT_DISPLAY_DURATION_MS: u64 = 1_500;
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 50;
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_RETRY_INITIAL_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Messages older than this at observation time never notify.
    pub recency_window_ms: u64,
    /// How long a notification stays visible before auto-dismiss.
    pub display_duration_ms: u64,
    pub preview_max_chars: usize,
    pub lookup_timeout_ms: u64,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    pub ride_title_fallback: String,
    pub sender_fallback: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recency_window_ms: DEFAULT_RECENCY_WINDOW_MS,
            display_duration_ms: DEFAULT_DISPLAY_DURATION_MS,
            preview_max_chars: DEFAULT_PREVIEW_MAX_CHARS,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            retry_initial_ms: DEFAULT_RETRY_INITIAL_MS,
            retry_max_ms: DEFAULT_RETRY_MAX_MS,
            ride_title_fallback: "Ride Chat".to_string(),
            sender_fallback: "Someone".to_string(),
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".rideping"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("rideping.toml"))
    }

    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.recency_window_ms).unwrap_or(i64::MAX))
    }

    pub fn display_duration(&self) -> Duration {
        Duration::from_millis(self.display_duration_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    /// Reject settings that would make the engine degenerate.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("recency_window_ms", self.recency_window_ms),
            ("lookup_timeout_ms", self.lookup_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::Validation(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
            i64::try_from(value).map_err(|_| {
                Error::Validation(format!("{} is out of range: {}", name, value))
            })?;
        }
        if self.display_duration_ms == 0 {
            return Err(Error::Validation(
                "display_duration_ms must be greater than zero".to_string(),
            ));
        }
        if self.preview_max_chars == 0 {
            return Err(Error::Validation(
                "preview_max_chars must be greater than zero".to_string(),
            ));
        }
        if self.retry_initial_ms == 0 || self.retry_max_ms < self.retry_initial_ms {
            return Err(Error::Validation(format!(
                "retry delays must satisfy 0 < retry_initial_ms ({}) <= retry_max_ms ({})",
                self.retry_initial_ms, self.retry_max_ms
            )));
        }
        Ok(())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        plog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            plog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        plog_debug!(
            "Config loaded: recency_window_ms={} display_duration_ms={}",
            config.recency_window_ms,
            config.display_duration_ms
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        Self::ensure_dirs()?;
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, toml::to_string_pretty(self)?)?;
        plog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let dir = Self::app_dir()?;
        if !dir.exists() {
            plog_debug!("Creating app directory: {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
