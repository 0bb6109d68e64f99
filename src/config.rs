//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::session::IssueRef;
use crate::{AppError, Result};

/// Keychain service name under which credentials are looked up.
pub const KEYCHAIN_SERVICE: &str = "issue-agent-bridge";

/// Environment variable holding the remote agent service API key.
pub const GATEWAY_KEY_ENV: &str = "DEVIN_API_KEY";

/// Environment variable holding the GitHub token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Remote agent service connectivity.
///
/// The API key is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    /// Base URL of the remote agent REST API.
    #[serde(default = "default_gateway_api_base")]
    pub api_base: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// API key (populated at runtime; absent means "not configured").
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: default_gateway_api_base(),
            request_timeout_seconds: default_request_timeout(),
            api_key: None,
        }
    }
}

/// Issue tracker connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Token (populated at runtime; absent means unauthenticated requests).
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            request_timeout_seconds: default_request_timeout(),
            token: None,
        }
    }
}

/// Polling cadence and wall-clock budget for session monitors.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Delay between two status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Budget measured from monitor start, after which the session times out.
    #[serde(default = "default_max_wait")]
    pub max_wait_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            max_wait_seconds: default_max_wait(),
        }
    }
}

impl MonitorConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Wall-clock budget as a [`Duration`].
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

fn default_gateway_api_base() -> String {
    "https://api.devin.ai/v1".into()
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_wait() -> u64 {
    1800
}

fn default_repo() -> String {
    "google/meridian".into()
}

fn default_http_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("issues.db")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Repository (`owner/repo`) used when a request omits one.
    #[serde(default = "default_repo")]
    pub default_repo: String,
    /// HTTP port for the inbound API.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Address the inbound API binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Remote agent service settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Issue tracker settings.
    #[serde(default)]
    pub github: GithubConfig,
    /// Session monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_repo: default_repo(),
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            db_path: default_db_path(),
            gateway: GatewayConfig::default(),
            github: GithubConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load API credentials from OS keychain with env-var fallback.
    ///
    /// Missing credentials are not an error here: an absent gateway key is
    /// reported by the session creation path, and an absent GitHub token
    /// degrades to unauthenticated requests.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain lookup task fails to run.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.gateway.api_key = load_credential("devin_api_key", GATEWAY_KEY_ENV).await?;
        self.github.token = load_credential("github_token", GITHUB_TOKEN_ENV).await?;
        if self.gateway.api_key.is_none() {
            warn!(
                env = GATEWAY_KEY_ENV,
                "remote agent api key not found; session creation will be refused"
            );
        }
        if self.github.token.is_none() {
            warn!(
                env = GITHUB_TOKEN_ENV,
                "github token not found; issue tracker requests are unauthenticated"
            );
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_seconds == 0 {
            return Err(AppError::Config(
                "monitor.poll_interval_seconds must be greater than zero".into(),
            ));
        }

        if self.monitor.max_wait_seconds == 0 {
            return Err(AppError::Config(
                "monitor.max_wait_seconds must be greater than zero".into(),
            ));
        }

        IssueRef::split_repo(&self.default_repo)
            .map_err(|err| AppError::Config(format!("default_repo invalid: {err}")))?;

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
///
/// Returns `Ok(None)` when neither source provides a non-empty value.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYCHAIN_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.trim().is_empty() => return Ok(Some(value.trim().to_owned())),
        Ok(_) => {
            debug!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            debug!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty()))
}
