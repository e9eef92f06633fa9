use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

/// Failures of the login callback routes.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The identity provider redirected back with an `error` parameter.
    #[error("Login rejected: {0}")]
    Rejected(String),

    /// Missing code, state mismatch, failed token exchange, ...
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Session or token store failure.
    #[error("Session error: {0}")]
    Session(String),
}

impl CallbackError {
    /// Short code passed to the error page as `?error=`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "login_rejected",
            Self::OAuth(_) => "login_failed",
            Self::Session(_) => "session_failed",
        }
    }

    /// Redirect to `error_redirect?error=<code>`. Rejections from the
    /// identity provider also forward its `error_description`.
    pub(super) fn redirect_to(&self, error_redirect: &str) -> Response {
        let mut target = format!("{error_redirect}?error={}", urlencoding::encode(self.code()));
        if let Self::Rejected(description) = self {
            let description = sanitize_description(description);
            if !description.is_empty() {
                target.push_str("&error_description=");
                target.push_str(&urlencoding::encode(&description));
            }
        }
        Redirect::to(&target).into_response()
    }
}

const MAX_DESCRIPTION_CHARS: usize = 200;

/// Drops control characters and caps the length of provider-supplied text.
fn sanitize_description(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .take(MAX_DESCRIPTION_CHARS)
        .collect::<String>()
        .trim()
        .to_owned()
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(_) | Self::OAuth(_) => {
                tracing::warn!(error = %self, "Login callback failed");
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::Session(_) => {
                tracing::error!(error = %self, "Login callback internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for CallbackError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Store(_) | crate::error::Error::Config(_) => {
                Self::Session(e.to_string())
            }
            other => Self::OAuth(other.to_string()),
        }
    }
}
