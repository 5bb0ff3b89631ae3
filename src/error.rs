use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Errors surfaced to callers of the API client.
///
/// `Clone` because a single refresh outcome is handed to every request that
/// waited on it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport could not reach the server at all.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The server rejected the access token and the refresh protocol could not recover.
    #[error("authorization expired")]
    AuthorizationExpired { payload: Value },

    /// The refresh token exchange failed. The session is over.
    #[error("session invalid: {0}")]
    SessionInvalid(String),

    /// Any other non-2xx response, with the server payload untouched.
    #[error("request rejected with status {status}")]
    RequestRejected { status: u16, payload: Value },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("credential store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Build the error for a non-2xx response.
    ///
    pub(crate) fn rejected(status: StatusCode, body: &[u8]) -> Self {
        let payload = error_payload(body);
        if status == StatusCode::UNAUTHORIZED {
            Self::AuthorizationExpired { payload }
        } else {
            Self::RequestRejected { status: status.as_u16(), payload }
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthorizationExpired { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::RequestRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server payload carried by the error, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::AuthorizationExpired { payload } | Self::RequestRejected { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }

    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }

    /// True when the UI should drop back to the login screen.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid(_))
    }
}

/// Response body as an error payload: JSON when it parses, text otherwise, `null` when empty.
pub(crate) fn error_payload(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
