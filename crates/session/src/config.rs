//! Client configuration (identity service endpoints, timeouts, storage).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("could not resolve a data directory for the credential store")]
    NoDataDir,
}

/// Session-layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API; endpoint paths are appended to it.
    pub api_url: String,
    /// Upper bound for every identity-service and API call.
    pub request_timeout: Duration,
    pub token_path: String,
    pub refresh_path: String,
    pub me_path: String,
    pub register_path: String,
    pub login_path: String,
    pub unauthorized_path: String,
    /// Location of the file-backed credential store (CLI only).
    pub store_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_path: "/token".to_string(),
            refresh_path: "/token/refresh".to_string(),
            me_path: "/users/me".to_string(),
            register_path: "/users".to_string(),
            login_path: landreg_auth::routes::LOGIN_PATH.to_string(),
            unauthorized_path: landreg_auth::routes::UNAUTHORIZED_PATH.to_string(),
            store_path: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Build from `LANDREG_*` environment variables, with defaults.
    ///
    /// - `LANDREG_API_URL` (default `http://localhost:8000/api`)
    /// - `LANDREG_REQUEST_TIMEOUT_SECS` (default 10, must be > 0)
    /// - `LANDREG_CREDENTIALS_PATH` (default `{data_dir}/landreg/credentials.json`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("LANDREG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "LANDREG_API_URL",
                reason: format!("'{api_url}' is not an http(s) URL"),
            });
        }

        let mut config = Self::new(api_url);

        if let Some(raw) = lookup("LANDREG_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "LANDREG_REQUEST_TIMEOUT_SECS",
                reason: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "LANDREG_REQUEST_TIMEOUT_SECS",
                    reason: "timeout must be at least one second".to_string(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        config.store_path = match lookup("LANDREG_CREDENTIALS_PATH") {
            Some(path) => Some(PathBuf::from(path)),
            None => Some(default_store_path()?),
        };

        Ok(config)
    }

    /// Join the base URL with an endpoint path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// `{app_data_dir}/landreg/credentials.json`.
fn default_store_path() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .ok_or(ConfigError::NoDataDir)?;
    dir.push("landreg");
    dir.push("credentials.json");
    Ok(dir)
}
