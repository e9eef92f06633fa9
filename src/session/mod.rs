//! Session holders: the components that own login state and the access token.
//!
//! The request pipeline only ever talks to a [`SessionHolder`]; it never
//! touches tokens directly. Two holders ship with the crate:
//!
//! - [`OidcSession`] (feature `oidc`): identity-provider backed, with PKCE
//!   login, transparent refresh and end-session logout.
//! - [`StoredTokenSession`]: a single token string kept in a [`TokenStore`],
//!   for simplified setups and tests.
//!
//! [`TokenStore`]: crate::store::TokenStore

#[cfg(feature = "oidc")]
mod oidc;
mod stored;

use std::future::Future;

use time::Duration;
use url::Url;

use crate::error::Error;

#[cfg(feature = "oidc")]
pub use oidc::{OidcSession, TokenSet};
pub use stored::StoredTokenSession;

/// Owner of the current authentication state.
///
/// Implementations serialize their own refresh logic; callers may invoke any
/// method concurrently.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionHolder for MySession {
///     async fn is_logged_in(&self) -> Result<bool, Error> { Ok(self.token.is_some()) }
///     async fn update_token(&self, _min_validity: Duration) -> Result<bool, Error> { Ok(false) }
///     async fn token(&self) -> Result<Option<String>, Error> { Ok(self.token.clone()) }
///     async fn login(&self, _: LoginOptions) -> Result<Option<Url>, Error> { Ok(None) }
///     async fn logout(&self, _: LogoutOptions) -> Result<Option<Url>, Error> { Ok(None) }
/// }
/// ```
pub trait SessionHolder: Send + Sync + 'static {
    /// Whether a session currently exists.
    fn is_logged_in(&self) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Refreshes the access token if it expires within `min_validity`.
    ///
    /// Returns `true` only when a refresh actually took place.
    fn update_token(
        &self,
        min_validity: Duration,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Current access token, if any.
    fn token(&self) -> impl Future<Output = Result<Option<String>, Error>> + Send;

    /// Begins interactive login.
    ///
    /// Returns the URL the user agent should be sent to. The holder never
    /// navigates by itself.
    fn login(
        &self,
        options: LoginOptions,
    ) -> impl Future<Output = Result<Option<Url>, Error>> + Send;

    /// Destroys the session and any persisted token.
    ///
    /// Returns the identity provider's end-session URL, if it has one.
    fn logout(
        &self,
        options: LogoutOptions,
    ) -> impl Future<Output = Result<Option<Url>, Error>> + Send;
}

/// Options for [`SessionHolder::login`].
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct LoginOptions {
    /// Overrides the configured redirect URI for this login only.
    pub redirect_uri: Option<Url>,
    /// Pre-fills the username field on the identity provider's form.
    pub login_hint: Option<String>,
    /// OIDC `prompt` parameter (`login`, `none`, `consent`).
    pub prompt: Option<String>,
}

impl LoginOptions {
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: Url) -> Self {
        self.redirect_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Options for [`SessionHolder::logout`].
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct LogoutOptions {
    /// Where the identity provider should send the user after logout.
    pub redirect_uri: Option<Url>,
}

impl LogoutOptions {
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: Url) -> Self {
        self.redirect_uri = Some(uri);
        self
    }
}
