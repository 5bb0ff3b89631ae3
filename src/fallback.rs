use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};

/// Offline degradation for callers that can show fixture data.
///
/// When mock mode is on, a `NetworkUnavailable` result is replaced by the
/// fixture. Every other result, success or failure, passes through untouched.
#[derive(Debug, Clone, Copy)]
pub struct MockFallback {
    enabled: bool,
}

impl MockFallback {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.mock_mode)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn resolve<T>(&self, result: Result<T>, fixture: impl FnOnce() -> T) -> Result<T> {
        match result {
            Err(ApiError::NetworkUnavailable(reason)) if self.enabled => {
                debug!(%reason, "backend unreachable, using fixture data");
                Ok(fixture())
            }
            other => other,
        }
    }
}
