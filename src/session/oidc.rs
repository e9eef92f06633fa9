use std::collections::VecDeque;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use url::Url;

use super::{LoginOptions, LogoutOptions, SessionHolder};
use crate::error::Error;
use crate::oauth::{AuthClient, AuthorizationRequest, TokenResponse, UserProfile};
use crate::store::{TOKEN_KEY, TokenStore};
use crate::token;

/// Lifetime assumed when neither `expires_in` nor an `exp` claim is available.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(5);

/// Upper bound applied to `expires_in`.
const MAX_TOKEN_LIFETIME: Duration = Duration::days(1);

/// Pending interactive logins kept at once; the oldest is evicted first.
const MAX_PENDING_LOGINS: usize = 16;

/// Tokens of an established session.
#[derive(Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: OffsetDateTime,
}

impl TokenSet {
    /// Builds a token set from a token endpoint response received at `now`.
    ///
    /// Expiry comes from a positive `expires_in` (capped at one day), else
    /// from the access token's `exp` claim, else a short default lifetime.
    #[must_use]
    pub fn from_response(response: TokenResponse, now: OffsetDateTime) -> Self {
        let expires_at = response
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(|secs| now.checked_add(Duration::seconds(secs).min(MAX_TOKEN_LIFETIME)))
            .or_else(|| {
                token::decode_unverified(&response.access_token)
                    .ok()
                    .and_then(|c| c.expires_at())
            })
            .unwrap_or(now + DEFAULT_TOKEN_LIFETIME);

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            expires_at,
        }
    }

    /// Builds a refresh-less token set from a bare access token.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if the token is not a JWT with an `exp` claim.
    pub fn from_access_token(access_token: impl Into<String>) -> Result<Self, Error> {
        let access_token = access_token.into();
        let expires_at = token::decode_unverified(&access_token)?
            .expires_at()
            .ok_or_else(|| Error::Token("missing claim: exp".into()))?;
        Ok(Self {
            access_token,
            refresh_token: None,
            id_token: None,
            expires_at,
        })
    }

    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        token::expires_within(self.expires_at, now, Duration::ZERO)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

struct PendingLogin {
    state: String,
    code_verifier: String,
    redirect_uri: Url,
}

#[derive(Default)]
struct SessionState {
    tokens: Option<TokenSet>,
    /// Oldest first, at most `MAX_PENDING_LOGINS`.
    pending: VecDeque<PendingLogin>,
}

/// Identity-provider backed session.
///
/// All state sits behind one async mutex that is held across refresh calls,
/// so concurrent [`update_token`](SessionHolder::update_token) callers cause
/// at most one round-trip to the token endpoint.
pub struct OidcSession {
    client: AuthClient,
    store: Option<Arc<dyn TokenStore>>,
    state: Mutex<SessionState>,
}

impl OidcSession {
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            store: None,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Persist the access token in `store` on login, and clear it on logout.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start from an already established token set.
    #[must_use]
    pub fn with_tokens(mut self, tokens: TokenSet) -> Self {
        self.state.get_mut().tokens = Some(tokens);
        self
    }

    /// Rebuilds a session from the access token persisted in `store`.
    ///
    /// Expired or unreadable tokens are removed from the store and yield a
    /// logged-out session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store cannot be read or cleaned up.
    pub fn restore(client: AuthClient, store: Arc<dyn TokenStore>) -> Result<Self, Error> {
        let session = Self::new(client).with_store(store.clone());
        let Some(raw) = store.get(TOKEN_KEY)? else {
            return Ok(session);
        };

        match TokenSet::from_access_token(raw) {
            Ok(tokens) if !tokens.is_expired(OffsetDateTime::now_utc()) => {
                tracing::debug!(expires_at = %tokens.expires_at, "Restored persisted session");
                Ok(session.with_tokens(tokens))
            }
            Ok(_) => {
                tracing::info!("Persisted token expired, discarding");
                store.remove(TOKEN_KEY)?;
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted token unreadable, discarding");
                store.remove(TOKEN_KEY)?;
                Ok(session)
            }
        }
    }

    #[must_use]
    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    /// Finishes interactive login from the redirect's `code` and `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OAuth`] if no login is pending or `state` matches
    /// none of them, and the token exchange errors otherwise. A mismatching
    /// `state` leaves the pending logins untouched.
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<(), Error> {
        let mut guard = self.state.lock().await;

        if guard.pending.is_empty() {
            return Err(Error::OAuth {
                operation: "login callback",
                status: None,
                detail: "no login in progress".into(),
            });
        }
        let matching = guard.pending.iter().position(|p| p.state == state);
        let Some(pending) = matching.and_then(|index| guard.pending.remove(index)) else {
            tracing::warn!("OAuth state mismatch");
            return Err(Error::OAuth {
                operation: "login callback",
                status: None,
                detail: "state mismatch".into(),
            });
        };

        let response = self
            .client
            .exchange_code(code, &pending.code_verifier, &pending.redirect_uri)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Token exchange failed"))?;

        let tokens = TokenSet::from_response(response, OffsetDateTime::now_utc());
        self.persist(&tokens.access_token)?;
        guard.tokens = Some(tokens);

        tracing::info!("OIDC login successful");
        Ok(())
    }

    /// Userinfo document of the current session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthRequired`] without a session, and the userinfo
    /// request's error otherwise.
    pub async fn profile(&self) -> Result<UserProfile, Error> {
        let access_token = self
            .state
            .lock()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(Error::AuthRequired { login_url: None })?;
        self.client.user_info(&access_token).await
    }

    /// Snapshot of the current token set.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.state.lock().await.tokens.clone()
    }

    fn persist(&self, access_token: &str) -> Result<(), Error> {
        match &self.store {
            Some(store) => store.set(TOKEN_KEY, access_token),
            None => Ok(()),
        }
    }

    fn forget(&self) -> Result<(), Error> {
        match &self.store {
            Some(store) => store.remove(TOKEN_KEY),
            None => Ok(()),
        }
    }
}

impl SessionHolder for OidcSession {
    async fn is_logged_in(&self) -> Result<bool, Error> {
        let state = self.state.lock().await;
        Ok(state.tokens.as_ref().is_some_and(|t| {
            t.refresh_token.is_some() || !t.is_expired(OffsetDateTime::now_utc())
        }))
    }

    async fn update_token(&self, min_validity: Duration) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        let Some(current) = state.tokens.as_ref() else {
            return Err(Error::AuthRequired { login_url: None });
        };

        let now = OffsetDateTime::now_utc();
        if !token::expires_within(current.expires_at, now, min_validity) {
            return Ok(false);
        }

        let Some(refresh_token) = current.refresh_token.clone() else {
            if current.is_expired(now) {
                state.tokens = None;
                self.forget()?;
                return Err(Error::AuthRequired { login_url: None });
            }
            // Still valid, just inside the threshold; nothing to refresh with.
            return Ok(false);
        };

        match self.client.refresh(&refresh_token).await {
            Ok(response) => {
                let mut tokens = TokenSet::from_response(response, OffsetDateTime::now_utc());
                // Keycloak may omit tokens it did not rotate.
                if tokens.refresh_token.is_none() {
                    tokens.refresh_token = Some(refresh_token);
                }
                if tokens.id_token.is_none() {
                    tokens.id_token = state.tokens.as_ref().and_then(|t| t.id_token.clone());
                }
                self.persist(&tokens.access_token)?;
                tracing::debug!(expires_at = %tokens.expires_at, "Access token refreshed");
                state.tokens = Some(tokens);
                Ok(true)
            }
            Err(e @ Error::OAuth { .. }) => {
                tracing::warn!(error = %e, "Refresh token rejected, clearing session");
                state.tokens = None;
                self.forget()?;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, keeping session");
                let still_valid = state
                    .tokens
                    .as_ref()
                    .is_some_and(|t| !t.is_expired(OffsetDateTime::now_utc()));
                if still_valid { Ok(false) } else { Err(e) }
            }
        }
    }

    async fn token(&self) -> Result<Option<String>, Error> {
        Ok(self
            .state
            .lock()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone()))
    }

    async fn login(&self, options: LoginOptions) -> Result<Option<Url>, Error> {
        let AuthorizationRequest {
            url,
            state,
            pkce,
            redirect_uri,
        } = self.client.authorization_url(&options);

        let mut guard = self.state.lock().await;
        if guard.pending.len() >= MAX_PENDING_LOGINS {
            guard.pending.pop_front();
        }
        guard.pending.push_back(PendingLogin {
            state,
            code_verifier: pkce.into_verifier(),
            redirect_uri,
        });
        drop(guard);

        tracing::info!("Interactive login required");
        Ok(Some(url))
    }

    async fn logout(&self, options: LogoutOptions) -> Result<Option<Url>, Error> {
        let previous = {
            let mut state = self.state.lock().await;
            state.pending.clear();
            state.tokens.take()
        };
        self.forget()?;

        let id_token = previous.as_ref().and_then(|t| t.id_token.as_deref());
        let url = self
            .client
            .end_session_url(id_token, options.redirect_uri.as_ref());
        tracing::info!("OIDC session cleared");
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::oauth::OidcConfig;
    use crate::store::MemoryTokenStore;

    fn client() -> AuthClient {
        // Unroutable endpoints: these tests never reach the network.
        AuthClient::new(
            OidcConfig::new(
                "http://127.0.0.1:9".parse().unwrap(),
                "test",
                "angularid",
                "http://localhost:4200/callback".parse().unwrap(),
            )
            .unwrap(),
        )
    }

    fn jwt_expiring_in(delta: Duration) -> String {
        let exp = (OffsetDateTime::now_utc() + delta).unix_timestamp();
        token::encode_unsigned(&json!({ "exp": exp, "sub": "user-1" }))
    }

    #[test]
    fn token_set_expiry_sources() {
        let now = OffsetDateTime::now_utc();
        let response: TokenResponse =
            serde_json::from_value(json!({"access_token": "opaque", "expires_in": 300})).unwrap();
        assert_eq!(
            TokenSet::from_response(response, now).expires_at,
            now + Duration::seconds(300)
        );

        let response: TokenResponse =
            serde_json::from_value(json!({"access_token": "opaque"})).unwrap();
        assert_eq!(
            TokenSet::from_response(response, now).expires_at,
            now + DEFAULT_TOKEN_LIFETIME
        );
    }

    #[test]
    fn token_set_ignores_unusable_expires_in() {
        let now = OffsetDateTime::now_utc();
        let response: TokenResponse = serde_json::from_value(
            json!({"access_token": "opaque", "expires_in": i64::MAX / 2}),
        )
        .unwrap();
        assert_eq!(
            TokenSet::from_response(response, now).expires_at,
            now + MAX_TOKEN_LIFETIME
        );

        let exp = now + Duration::minutes(10);
        let access_token = token::encode_unsigned(&json!({ "exp": exp.unix_timestamp() }));
        let response: TokenResponse = serde_json::from_value(
            json!({"access_token": access_token, "expires_in": -30}),
        )
        .unwrap();
        assert_eq!(
            TokenSet::from_response(response, now).expires_at.unix_timestamp(),
            exp.unix_timestamp()
        );
    }

    fn refreshable(expires_in: Duration) -> TokenSet {
        TokenSet {
            access_token: jwt_expiring_in(expires_in),
            refresh_token: Some("refresh-1".into()),
            id_token: None,
            expires_at: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn unreachable_provider_keeps_session() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set(TOKEN_KEY, "persisted").unwrap();

        // Still valid: the request goes ahead with the current token.
        let session = OidcSession::new(client())
            .with_store(store.clone())
            .with_tokens(refreshable(Duration::seconds(10)));
        assert!(!session.update_token(Duration::seconds(30)).await.unwrap());
        assert!(session.tokens().await.is_some());

        // Expired: the transport error surfaces, tokens stay for a retry.
        let session = OidcSession::new(client())
            .with_store(store.clone())
            .with_tokens(refreshable(Duration::seconds(-10)));
        assert!(matches!(
            session.update_token(Duration::seconds(30)).await,
            Err(Error::Http(_))
        ));
        assert!(session.tokens().await.is_some());
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn fresh_session_is_logged_out() {
        let session = OidcSession::new(client());
        assert!(!session.is_logged_in().await.unwrap());
        assert_eq!(session.token().await.unwrap(), None);
        assert!(matches!(
            session.update_token(Duration::seconds(30)).await,
            Err(Error::AuthRequired { .. })
        ));
    }

    #[tokio::test]
    async fn valid_token_needs_no_refresh() {
        let tokens = TokenSet::from_access_token(jwt_expiring_in(Duration::hours(1))).unwrap();
        let session = OidcSession::new(client()).with_tokens(tokens);

        assert!(session.is_logged_in().await.unwrap());
        assert!(!session.update_token(Duration::seconds(30)).await.unwrap());
        assert!(session.token().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_token_without_refresh_is_cleared() {
        let store = Arc::new(MemoryTokenStore::new());
        let raw = jwt_expiring_in(Duration::seconds(-60));
        store.set(TOKEN_KEY, &raw).unwrap();

        let tokens = TokenSet::from_access_token(raw).unwrap();
        let session = OidcSession::new(client())
            .with_store(store.clone())
            .with_tokens(tokens);

        assert!(!session.is_logged_in().await.unwrap());
        assert!(matches!(
            session.update_token(Duration::seconds(30)).await,
            Err(Error::AuthRequired { .. })
        ));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn restore_keeps_valid_and_drops_expired() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set(TOKEN_KEY, &jwt_expiring_in(Duration::minutes(10)))
            .unwrap();
        let session = OidcSession::restore(client(), store.clone()).unwrap();
        assert!(session.is_logged_in().await.unwrap());

        store
            .set(TOKEN_KEY, &jwt_expiring_in(Duration::minutes(-10)))
            .unwrap();
        let session = OidcSession::restore(client(), store.clone()).unwrap();
        assert!(!session.is_logged_in().await.unwrap());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);

        store.set(TOKEN_KEY, "not-a-jwt").unwrap();
        let session = OidcSession::restore(client(), store.clone()).unwrap();
        assert!(!session.is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn login_returns_authorization_url() {
        let session = OidcSession::new(client());
        let url = session.login(LoginOptions::default()).await.unwrap().unwrap();
        assert!(url.as_str().starts_with(
            "http://127.0.0.1:9/realms/test/protocol/openid-connect/auth?"
        ));
    }

    #[tokio::test]
    async fn callback_rejects_state_mismatch_and_missing_login() {
        let session = OidcSession::new(client());
        assert!(matches!(
            session.complete_login("code", "state").await,
            Err(Error::OAuth { .. })
        ));

        session.login(LoginOptions::default()).await.unwrap();
        let err = session.complete_login("code", "wrong-state").await.unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
        assert_eq!(session.state.lock().await.pending.len(), 1);
    }

    #[tokio::test]
    async fn pending_logins_are_bounded() {
        let session = OidcSession::new(client());
        let first = session.login(LoginOptions::default()).await.unwrap().unwrap();
        for _ in 0..MAX_PENDING_LOGINS {
            session.login(LoginOptions::default()).await.unwrap();
        }

        let state = first
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let guard = session.state.lock().await;
        assert_eq!(guard.pending.len(), MAX_PENDING_LOGINS);
        assert!(guard.pending.iter().all(|p| p.state != state));
    }

    #[tokio::test]
    async fn logout_clears_tokens_and_store() {
        let store = Arc::new(MemoryTokenStore::new());
        let raw = jwt_expiring_in(Duration::hours(1));
        store.set(TOKEN_KEY, &raw).unwrap();
        let session = OidcSession::restore(client(), store.clone()).unwrap();

        let redirect: Url = "http://localhost:4200".parse().unwrap();
        let url = session
            .logout(LogoutOptions::default().with_redirect_uri(redirect))
            .await
            .unwrap()
            .unwrap();

        assert!(url.as_str().contains("post_logout_redirect_uri="));
        assert!(!session.is_logged_in().await.unwrap());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }
}
