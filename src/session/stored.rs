use std::sync::Arc;

use time::Duration;
use url::Url;

use super::{LoginOptions, LogoutOptions, SessionHolder};
use crate::error::Error;
use crate::store::{TOKEN_KEY, TokenStore};

/// Session backed by a single token string in a [`TokenStore`].
///
/// There is no identity provider behind it: logged in means "a non-empty
/// token is stored", refresh is a no-op and login produces no redirect.
pub struct StoredTokenSession {
    store: Arc<dyn TokenStore>,
}

impl StoredTokenSession {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Persists `token` as the current session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] for an empty token, or [`Error::Store`] if it
    /// cannot be written.
    pub fn sign_in(&self, token: &str) -> Result<(), Error> {
        if token.trim().is_empty() {
            tracing::warn!("Refusing to store an empty session token");
            return Err(Error::Token("empty token".into()));
        }
        self.store.set(TOKEN_KEY, token)
    }

    fn stored_token(&self) -> Result<Option<String>, Error> {
        Ok(self
            .store
            .get(TOKEN_KEY)?
            .filter(|t| !t.trim().is_empty()))
    }
}

impl SessionHolder for StoredTokenSession {
    async fn is_logged_in(&self) -> Result<bool, Error> {
        Ok(self.stored_token()?.is_some())
    }

    async fn update_token(&self, _min_validity: Duration) -> Result<bool, Error> {
        Ok(false)
    }

    async fn token(&self) -> Result<Option<String>, Error> {
        self.stored_token()
    }

    async fn login(&self, _options: LoginOptions) -> Result<Option<Url>, Error> {
        Ok(None)
    }

    async fn logout(&self, _options: LogoutOptions) -> Result<Option<Url>, Error> {
        self.store.remove(TOKEN_KEY)?;
        tracing::info!("Stored session cleared");
        Ok(None)
    }
}
