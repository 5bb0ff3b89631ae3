use std::time::Duration;

use reqwest::Url;

use crate::error::{ApiError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const API_PREFIX: &str = "/api";

pub const ENV_API_URL: &str = "SLOTH_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "SLOTH_TIMEOUT_SECS";
pub const ENV_MOCK_MODE: &str = "SLOTH_MOCK_MODE";

/// Connection settings shared by every request the client issues.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
    /// Callers may substitute fixture data when the backend is unreachable.
    pub mock_mode: bool,
}

impl ClientConfig {
    /// Create a config for the given backend URL. The URL is rooted at `/api`
    /// whether or not the caller included it.
    pub fn new(api_url: &str) -> Result<Self> {
        let normalized = normalize_api_url(api_url);
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::Config(format!("invalid API URL {normalized:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config(format!("API URL {normalized:?} cannot be a base")));
        }
        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            mock_mode: false,
        })
    }

    /// Read `SLOTH_API_URL`, `SLOTH_TIMEOUT_SECS` and `SLOTH_MOCK_MODE`.
    ///
    /// Mock mode is on when `SLOTH_MOCK_MODE=true`, or when no API URL is configured at all.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty());
        let mut config = Self::new(api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ApiError::Config(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {secs:?}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        let mock_flag =
            lookup(ENV_MOCK_MODE).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        config.mock_mode = mock_flag || api_url.is_none();
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the API root. Leading slashes on `path` are ignored,
    /// so `"/manuals/"` and `"manuals/"` resolve to the same URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = format!("{base}/{path}");
        Url::parse(&joined)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path {path:?}: {e}")))
    }
}

/// Append the `/api` prefix unless the URL already ends with it.
pub fn normalize_api_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else if let Some(stripped) = trimmed.strip_suffix('/') {
        if stripped.ends_with(API_PREFIX) {
            stripped.to_string()
        } else {
            format!("{stripped}{API_PREFIX}")
        }
    } else {
        format!("{trimmed}{API_PREFIX}")
    }
}
