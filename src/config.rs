use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_HISTORICAL_CUTOFF_YEAR, DEFAULT_TAXA,
};
use crate::error::{CheckError, Result};

/// Run configuration handed to the fetcher and the pipelines.
///
/// Every field has a default so a config file only needs the keys it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub access_token: Option<String>,
    pub api_base_url: String,
    /// Taxon identifiers whose species are checked
    pub taxa: Vec<String>,
    pub output_dir: PathBuf,
    /// Restrict the name check to specimens placed in a Finnish province.
    /// The new taxa check is always restricted.
    pub only_finnish_provinces: bool,
    pub specimen_page_size: u32,
    pub taxon_page_size: u32,
    pub timeout_seconds: u64,
    pub historical_cutoff_year: i32,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            taxa: DEFAULT_TAXA.iter().map(|t| t.to_string()).collect(),
            output_dir: PathBuf::from("."),
            only_finnish_provinces: true,
            specimen_page_size: 10_000,
            taxon_page_size: 1_000,
            timeout_seconds: 120,
            historical_cutoff_year: DEFAULT_HISTORICAL_CUTOFF_YEAR,
            retry: RetryConfig::default(),
        }
    }
}

/// Values given on the command line, applied over the file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub taxa: Option<Vec<String>>,
    pub output_dir: Option<PathBuf>,
    pub all_provinces: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based), doubling each time up to the cap.
    /// A server supplied `Retry-After` takes precedence but is still capped.
    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        let delay = match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => {
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
            }
        };
        delay.min(max)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CheckError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Layer the environment token and then command line values over the loaded file.
    pub fn apply_overrides(&mut self, env_token: Option<String>, overrides: &ConfigOverrides) {
        if let Some(token) = env_token {
            self.access_token = Some(token);
        }
        if let Some(token) = &overrides.token {
            self.access_token = Some(token.clone());
        }
        if let Some(taxa) = &overrides.taxa {
            self.taxa = taxa
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if overrides.all_provinces {
            self.only_finnish_provinces = false;
        }
    }

    /// The access token, or a configuration error if none was supplied.
    pub fn require_token(&self) -> Result<&str> {
        match self.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(CheckError::Config(
                "no access token configured; get one from https://api.laji.fi".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.require_token()?;
        if self.taxa.is_empty() {
            return Err(CheckError::Config("at least one taxon is required".to_string()));
        }
        if self.specimen_page_size == 0 || self.taxon_page_size == 0 {
            return Err(CheckError::Config("page sizes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
