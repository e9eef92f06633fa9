use std::fmt;

use url::Url;

/// Message used when a failed response carries no body at all.
pub(crate) const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No usable session: the request was never sent.
    ///
    /// `login_url` is where the UI should send the user, when the session
    /// holder produced one.
    #[error("User not authenticated")]
    AuthRequired { login_url: Option<Url> },

    /// The dispatched request failed, either in transport or with a non-2xx status.
    #[error(transparent)]
    Request(#[from] NormalizedError),

    /// A successful response did not match its declared shape.
    #[error("Response decoding error: {0}")]
    Decode(String),

    #[error("OAuth2 error during {operation}: {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Token store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of the failed request, if a response was received.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.http_status,
            Self::OAuth { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }
}

/// Flattened view over a failed request.
///
/// Transport failures only carry `client_message`; received error responses
/// carry the status, its reason phrase and the backend message. Either way
/// [`Display`](fmt::Display) reduces it to one human-readable line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct NormalizedError {
    pub http_status: Option<u16>,
    pub status_text: Option<String>,
    pub backend_message: Option<String>,
    pub client_message: Option<String>,
}

impl NormalizedError {
    /// The request never produced a response (offline, DNS, TLS, ...).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            client_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// The server answered with a non-success status.
    #[must_use]
    pub fn response(
        status: u16,
        status_text: impl Into<String>,
        backend_message: impl Into<String>,
    ) -> Self {
        Self {
            http_status: Some(status),
            status_text: Some(status_text.into()),
            backend_message: Some(backend_message.into()),
            client_message: None,
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.http_status.is_none()
    }

    /// The display string, for callers that need an owned message.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(
                f,
                "HTTP {status}: {} - {}",
                self.status_text.as_deref().unwrap_or_default(),
                self.backend_message.as_deref().unwrap_or(UNKNOWN_ERROR),
            ),
            None => write!(
                f,
                "Error: {}",
                self.client_message.as_deref().unwrap_or(UNKNOWN_ERROR)
            ),
        }
    }
}

impl std::error::Error for NormalizedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_message() {
        let err = NormalizedError::response(404, "Not Found", "not found");
        assert_eq!(err.to_string(), "HTTP 404: Not Found - not found");
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_error_message() {
        let err = NormalizedError::transport("connection refused");
        assert_eq!(err.to_string(), "Error: connection refused");
        assert!(err.is_transport());
    }

    #[test]
    fn request_error_is_transparent() {
        let err: Error = NormalizedError::response(500, "Internal Server Error", "boom").into();
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error - boom");
        assert_eq!(err.http_status(), Some(500));
    }

    #[test]
    fn auth_required_message() {
        let err = Error::AuthRequired { login_url: None };
        assert_eq!(err.to_string(), "User not authenticated");
        assert!(err.is_auth_required());
        assert_eq!(err.http_status(), None);
    }
}
