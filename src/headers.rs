use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use time::Duration;
use url::Url;

use crate::error::Error;
use crate::session::{LoginOptions, SessionHolder};
use crate::types::BearerToken;

/// Tokens expiring sooner than this are refreshed before a request.
pub const REFRESH_THRESHOLD: Duration = Duration::seconds(30);

/// Authorization metadata for exactly one outgoing request.
///
/// Never cached: tokens can expire between calls.
#[derive(Debug, Clone)]
pub struct HeaderSet {
    headers: HeaderMap,
    multipart: bool,
}

impl HeaderSet {
    /// `Authorization: Bearer <token>`, plus `Content-Type: application/json`
    /// unless `multipart` (the form encoder supplies the boundary itself).
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if the token contains bytes not allowed in a header.
    pub fn new(token: &BearerToken, multipart: bool) -> Result<Self, Error> {
        let mut authorization = HeaderValue::from_str(&token.header_value())
            .map_err(|_| Error::Token("token is not a valid header value".into()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        if !multipart {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(Self { headers, multipart })
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    #[must_use]
    pub fn as_map(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Result of [`HeaderBuilder::build`].
#[derive(Debug)]
pub enum HeaderOutcome {
    Ready(HeaderSet),
    /// Do not send the request. `login_url` is where interactive login starts.
    AuthRequired { login_url: Option<Url> },
}

impl HeaderOutcome {
    /// # Errors
    ///
    /// Returns [`Error::AuthRequired`] for the `AuthRequired` outcome.
    pub fn into_result(self) -> Result<HeaderSet, Error> {
        match self {
            Self::Ready(headers) => Ok(headers),
            Self::AuthRequired { login_url } => Err(Error::AuthRequired { login_url }),
        }
    }
}

enum TokenLookup {
    LoggedOut,
    Empty,
    Token(BearerToken),
}

/// Produces a [`HeaderSet`] from the current session, or says why it can't.
pub struct HeaderBuilder<S> {
    session: Arc<S>,
    refresh_threshold: Duration,
    login_options: LoginOptions,
    trigger_login: bool,
}

impl<S: SessionHolder> HeaderBuilder<S> {
    #[must_use]
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            refresh_threshold: REFRESH_THRESHOLD,
            login_options: LoginOptions::default(),
            trigger_login: true,
        }
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Options passed to [`SessionHolder::login`] when no session exists.
    #[must_use]
    pub fn with_login_options(mut self, options: LoginOptions) -> Self {
        self.login_options = options;
        self
    }

    /// When `false`, a missing session yields `AuthRequired` without asking
    /// the holder to start a login.
    #[must_use]
    pub fn with_login_trigger(mut self, enabled: bool) -> Self {
        self.trigger_login = enabled;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    #[must_use]
    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    /// Builds the headers for one request.
    ///
    /// Never fails: holder errors are logged and handled like a missing
    /// session.
    pub async fn build(&self, multipart: bool) -> HeaderOutcome {
        let lookup = self.lookup().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Error retrieving token");
            TokenLookup::LoggedOut
        });

        match lookup {
            TokenLookup::Token(token) => match HeaderSet::new(&token, multipart) {
                Ok(headers) => HeaderOutcome::Ready(headers),
                Err(e) => {
                    tracing::warn!(error = %e, "Unusable access token");
                    HeaderOutcome::AuthRequired { login_url: None }
                }
            },
            TokenLookup::Empty => {
                tracing::warn!("Session reports logged in but holds no token");
                HeaderOutcome::AuthRequired { login_url: None }
            }
            TokenLookup::LoggedOut => HeaderOutcome::AuthRequired {
                login_url: self.begin_login().await,
            },
        }
    }

    async fn lookup(&self) -> Result<TokenLookup, Error> {
        if !self.session.is_logged_in().await? {
            return Ok(TokenLookup::LoggedOut);
        }
        self.session.update_token(self.refresh_threshold).await?;
        Ok(match self.session.token().await?.and_then(BearerToken::new) {
            Some(token) => TokenLookup::Token(token),
            None => TokenLookup::Empty,
        })
    }

    async fn begin_login(&self) -> Option<Url> {
        if !self.trigger_login {
            return None;
        }
        tracing::warn!("User not logged in, starting interactive login");
        match self.session.login(self.login_options.clone()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "Could not start interactive login");
                None
            }
        }
    }
}
