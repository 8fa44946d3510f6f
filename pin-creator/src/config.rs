//! Run configuration loaded from YAML.
//!
//! Only `schedule_file_path` is required; every section falls back to its
//! defaults when omitted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{Privacy, DEFAULT_BASE_URL};
use crate::errors::{PinCreatorError, Result};
use crate::retry::RetryPolicy;

/// Largest page size the boards endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Top-level configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Path of the `;`-delimited schedule CSV.
    pub schedule_file_path: PathBuf,
    /// Where the access token comes from.
    #[serde(default)]
    pub auth: AuthConfig,
    /// HTTP client settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Layered deadlines.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Backoff for board resolution.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Settings for boards created on demand.
    #[serde(default)]
    pub board: BoardConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// Creates a configuration with defaults for everything but the schedule.
    #[must_use]
    pub fn new(schedule_file_path: impl Into<PathBuf>) -> Self {
        Self {
            schedule_file_path: schedule_file_path.into(),
            auth: AuthConfig::default(),
            api: ApiConfig::default(),
            timeouts: TimeoutConfig::default(),
            retry: RetryPolicy::default(),
            board: BoardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PinCreatorError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| PinCreatorError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(PinCreatorError::Config(msg.to_string())) };

        if self.schedule_file_path.as_os_str().is_empty() {
            return invalid("schedule_file_path must not be empty");
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("timeouts.run_seconds", t.run_seconds),
            ("timeouts.board_resolution_seconds", t.board_resolution_seconds),
            ("timeouts.pin_creation_seconds", t.pin_creation_seconds),
            ("api.request_timeout_seconds", self.api.request_timeout_seconds),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PinCreatorError::Config(format!("{name} must be positive")));
            }
        }
        if t.board_resolution_seconds > t.run_seconds {
            return invalid("timeouts.board_resolution_seconds must not exceed run_seconds");
        }
        if t.pin_creation_seconds > t.run_seconds {
            return invalid("timeouts.pin_creation_seconds must not exceed run_seconds");
        }

        let r = &self.retry;
        if r.base_delay_ms > r.max_delay_ms {
            return invalid("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        if r.multiplier < 1 {
            return invalid("retry.multiplier must be at least 1");
        }
        if r.max_attempts < 1 {
            return invalid("retry.max_attempts must be at least 1");
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.api.page_size) {
            return Err(PinCreatorError::Config(format!(
                "api.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(())
    }
}

/// Access token sources, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// File holding the token.
    #[serde(default = "default_access_token_path")]
    pub access_token_path: PathBuf,
    /// Environment variable consulted when the file is missing or empty.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
}

fn default_access_token_path() -> PathBuf {
    PathBuf::from("access_token.txt")
}

fn default_access_token_env() -> String {
    "PINTEREST_ACCESS_TOKEN".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_path: default_access_token_path(),
            access_token_env: default_access_token_env(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://api.pinterest.com/v5/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
    /// Boards fetched per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> f64 {
    15.0
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl ApiConfig {
    /// Gets the request timeout as Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_seconds)
    }
}

/// Layered deadlines, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Whole run.
    #[serde(default = "default_run_timeout")]
    pub run_seconds: f64,
    /// Board lookup, including creation and waiting for visibility.
    #[serde(default = "default_board_resolution_timeout")]
    pub board_resolution_seconds: f64,
    /// The single pin creation call.
    #[serde(default = "default_pin_creation_timeout")]
    pub pin_creation_seconds: f64,
}

fn default_run_timeout() -> f64 {
    60.0
}

fn default_board_resolution_timeout() -> f64 {
    30.0
}

fn default_pin_creation_timeout() -> f64 {
    20.0
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            run_seconds: default_run_timeout(),
            board_resolution_seconds: default_board_resolution_timeout(),
            pin_creation_seconds: default_pin_creation_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Gets the run timeout as Duration.
    #[must_use]
    pub fn run(&self) -> Duration {
        Duration::from_secs_f64(self.run_seconds)
    }

    /// Gets the board resolution timeout as Duration.
    #[must_use]
    pub fn board_resolution(&self) -> Duration {
        Duration::from_secs_f64(self.board_resolution_seconds)
    }

    /// Gets the pin creation timeout as Duration.
    #[must_use]
    pub fn pin_creation(&self) -> Duration {
        Duration::from_secs_f64(self.pin_creation_seconds)
    }
}

/// Settings applied to boards created on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board description.
    #[serde(default = "default_board_description")]
    pub description: String,
    /// Board visibility.
    #[serde(default)]
    pub privacy: Privacy,
}

fn default_board_description() -> String {
    "Created by pin-creator".to_string()
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            description: default_board_description(),
            privacy: Privacy::default(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of compact text.
    #[serde(default)]
    pub json: bool,
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = RunConfig::from_yaml("schedule_file_path: schedule.csv\n").expect("valid");

        assert_eq!(config.schedule_file_path, PathBuf::from("schedule.csv"));
        assert_eq!(config.auth.access_token_env, "PINTEREST_ACCESS_TOKEN");
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.page_size, 250);
        assert_eq!(config.timeouts.run(), Duration::from_secs(60));
        assert_eq!(config.timeouts.board_resolution(), Duration::from_secs(30));
        assert_eq!(config.timeouts.pin_creation(), Duration::from_secs(20));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.board.description, "Created by pin-creator");
        assert_eq!(config.board.privacy, Privacy::Public);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r"
schedule_file_path: /data/pins.csv
auth:
  access_token_path: /secrets/token
api:
  base_url: https://api.pinterest.com/v5/
  page_size: 100
timeouts:
  run_seconds: 90
  board_resolution_seconds: 45
retry:
  base_delay_ms: 500
  max_attempts: 5
board:
  description: Travel photos
  privacy: SECRET
logging:
  json: true
  level: debug
";
        let config = RunConfig::from_yaml(yaml).expect("valid");

        assert_eq!(config.auth.access_token_path, PathBuf::from("/secrets/token"));
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.timeouts.board_resolution(), Duration::from_secs(45));
        assert_eq!(config.timeouts.pin_creation(), Duration::from_secs(20));
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.multiplier, 2);
        assert_eq!(config.board.privacy, Privacy::Secret);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_schedule_path_rejected() {
        let err = RunConfig::from_yaml("api:\n  page_size: 10\n").expect_err("required field");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_resolution_longer_than_run_rejected() {
        let mut config = RunConfig::new("s.csv");
        config.timeouts.board_resolution_seconds = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        let mut config = RunConfig::new("s.csv");
        config.timeouts.pin_creation_seconds = 0.0;
        let err = config.validate().expect_err("zero timeout");
        assert!(err.to_string().contains("pin_creation_seconds"));
    }

    #[test]
    fn test_retry_constraints() {
        let mut config = RunConfig::new("s.csv");
        config.retry.base_delay_ms = 120_000;
        assert!(config.validate().is_err());

        let mut config = RunConfig::new("s.csv");
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::new("s.csv");
        config.retry.multiplier = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = RunConfig::new("s.csv");
        config.api.page_size = 251;
        assert!(config.validate().is_err());
        config.api.page_size = 0;
        assert!(config.validate().is_err());
        config.api.page_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = RunConfig::load(&dir.path().join("missing.yaml")).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
