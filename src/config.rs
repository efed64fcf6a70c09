// src/config.rs

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::SyncError;

// Provider defaults
pub const DEFAULT_BASE_URL: &str = "https://api.crunchbase.com/v3.1";
pub const DEFAULT_API_ENDPOINT: &str = "/odm-organizations";

// Reference data defaults
pub const DEFAULT_ISP_FILE: &str = "data/isp_domains.txt";
pub const DEFAULT_TLD_FILE: &str = "data/tlds.txt";

// Records between progress lines
pub const PROGRESS_EVERY: usize = 25;

// Non-skipped records between throttle pauses
pub const THROTTLE_EVERY: usize = 25;

// Pause taken at each throttle point, keeps us under the provider's request ceiling
pub const DEFAULT_SLEEP_SECS: u64 = 60;

// Connect backoff: delay = base * attempt
pub const DEFAULT_CONNECT_BACKOFF_SECS: u64 = 30;
pub const MAX_CONNECT_ATTEMPTS: u32 = 4;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// Company names shorter than this carry too little signal to resolve
pub const MIN_COMPANY_NAME_LEN: usize = 2;

/// Provider and reference-data settings for a run.
///
/// Database settings are read separately by [`crate::db::connect`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_endpoint: String,
    pub isp_file: PathBuf,
    pub tld_file: PathBuf,
    pub sleep_secs: u64,
    pub connect_backoff_secs: u64,
}

impl AppConfig {
    /// Reads settings from the process environment. `API_KEY` is required.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but with an injectable lookup, so tests
    /// don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(SyncError::MissingConfig("API_KEY"))?;

        let sleep_secs = parse_secs(&lookup, "SLEEP_SECS", DEFAULT_SLEEP_SECS)?;
        let connect_backoff_secs = parse_secs(
            &lookup,
            "CONNECT_BACKOFF_SECS",
            DEFAULT_CONNECT_BACKOFF_SECS,
        )?;

        let base_url = lookup("PROVIDER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|e| SyncError::InvalidConfig {
            var: "PROVIDER_BASE_URL",
            reason: format!("'{}' is not a valid URL ({})", base_url, e),
        })?;

        Ok(Self {
            api_key,
            base_url,
            api_endpoint: lookup("PROVIDER_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            isp_file: lookup("ISP_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ISP_FILE)),
            tld_file: lookup("TLD_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TLD_FILE)),
            sleep_secs,
            connect_backoff_secs,
        })
    }

    pub fn query_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_endpoint
        )
    }

    pub fn throttle_pause(&self) -> Duration {
        Duration::from_secs(self.sleep_secs)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_secs(self.connect_backoff_secs)
    }
}

fn parse_secs<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| SyncError::InvalidConfig {
            var,
            reason: format!("'{}' is not a number of seconds ({})", raw, e),
        }),
    }
}
