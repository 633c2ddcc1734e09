//! Client configuration loaded via OrthoConfig.
//!
//! Every field is optional; accessors fall back to defaults. [`ClientSettings::resolve`]
//! validates the raw values into a [`ClientConfig`] before anything is wired.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{CredentialPolicy, DEFAULT_POLL_INTERVAL, PollSettings};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ACCESS_TTL_HOURS: u32 = 24;
const DEFAULT_REFRESH_TTL_DAYS: u32 = 30;

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Layered sources could not be read or merged.
    #[error("failed to load configuration: {message}")]
    Load {
        /// Loader diagnostic.
        message: String,
    },
    /// The base URL did not parse or is not HTTP(S).
    #[error("invalid base URL '{value}': {message}")]
    InvalidBaseUrl {
        /// Configured value.
        value: String,
        /// Why it was rejected.
        message: String,
    },
    /// A duration or lifetime that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending setting.
        field: &'static str,
    },
}

/// Raw settings for the `vidsum` client.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "VIDSUM")]
pub struct ClientSettings {
    /// Service API root, e.g. `https://summaries.example.com/api/`.
    pub base_url: Option<String>,
    /// Delay between task status queries, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Stop polling a task after this many non-terminal reports.
    pub max_polls: Option<u32>,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Location of the stored session file.
    pub credentials_path: Option<PathBuf>,
    /// Lifetime stamped onto access credentials, in hours.
    pub access_ttl_hours: Option<u32>,
    /// Lifetime stamped onto refresh credentials, in days.
    pub refresh_ttl_days: Option<u32>,
}

/// Validated configuration ready for wiring.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service API root.
    pub base_url: Url,
    /// Task polling cadence and cap.
    pub poll: PollSettings,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Location of the stored session file.
    pub credentials_path: PathBuf,
    /// Expiry policy stamped on saved credentials.
    pub policy: CredentialPolicy,
}

fn default_credentials_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vidsum")
        .join("credentials.json")
}

fn positive<T: Default + PartialEq>(value: T, field: &'static str) -> Result<T, ConfigError> {
    if value == T::default() {
        Err(ConfigError::Zero { field })
    } else {
        Ok(value)
    }
}

impl ClientSettings {
    /// Load settings from the environment and configuration files only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source cannot be parsed.
    pub fn load_ambient() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("vidsum")]).map_err(|error| {
            ConfigError::Load {
                message: error.to_string(),
            }
        })
    }

    /// Configured base URL, falling back to the local development server.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Configured session file, falling back to the platform config directory.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(default_credentials_path)
    }

    /// Validate every field and apply defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unparseable or non-HTTP base URL and
    /// for zero intervals, timeouts or lifetimes.
    pub fn resolve(&self) -> Result<ClientConfig, ConfigError> {
        let raw_url = self.base_url();
        let base_url = Url::parse(raw_url).map_err(|error| ConfigError::InvalidBaseUrl {
            value: raw_url.to_owned(),
            message: error.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                value: raw_url.to_owned(),
                message: "scheme must be http or https".to_owned(),
            });
        }

        let interval = match self.poll_interval_ms {
            Some(ms) => Duration::from_millis(positive(ms, "poll_interval_ms")?),
            None => DEFAULT_POLL_INTERVAL,
        };
        let max_polls = self
            .max_polls
            .map(|cap| positive(cap, "max_polls"))
            .transpose()?;
        let timeout_secs = positive(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            "request_timeout_secs",
        )?;
        let access_hours = positive(
            self.access_ttl_hours.unwrap_or(DEFAULT_ACCESS_TTL_HOURS),
            "access_ttl_hours",
        )?;
        let refresh_days = positive(
            self.refresh_ttl_days.unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
            "refresh_ttl_days",
        )?;

        Ok(ClientConfig {
            base_url,
            poll: PollSettings {
                interval,
                max_polls,
            },
            request_timeout: Duration::from_secs(timeout_secs),
            credentials_path: self.credentials_path(),
            policy: CredentialPolicy {
                access_ttl: TimeDelta::hours(i64::from(access_hours)),
                refresh_ttl: TimeDelta::days(i64::from(refresh_days)),
            },
        })
    }
}
