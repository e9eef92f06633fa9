use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::pkce::{self, PkceChallenge};
use crate::session::LoginOptions;

/// OpenID Connect client configuration for a Keycloak-style realm.
///
/// Endpoints are derived from the server URL and realm; each can be
/// overridden individually.
///
/// ```rust,ignore
/// use bpm_console::OidcConfig;
///
/// let config = OidcConfig::new(
///     "http://localhost:8080".parse()?,
///     "test",
///     "angularid",
///     "http://localhost:4200/callback".parse()?,
/// )?
/// .with_scopes(vec!["openid".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) client_id: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) userinfo_url: Url,
    pub(crate) end_session_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OidcConfig {
    /// Create a configuration for `realm` on `server_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the realm name produces an invalid URL.
    pub fn new(
        server_url: Url,
        realm: &str,
        client_id: impl Into<String>,
        redirect_uri: Url,
    ) -> Result<Self, Error> {
        let endpoint = |name: &str| -> Result<Url, Error> {
            let base = server_url.as_str().trim_end_matches('/');
            format!("{base}/realms/{realm}/protocol/openid-connect/{name}")
                .parse()
                .map_err(|e| Error::Config(format!("OIDC {name} endpoint: {e}")))
        };

        Ok(Self {
            client_id: client_id.into(),
            auth_url: endpoint("auth")?,
            token_url: endpoint("token")?,
            userinfo_url: endpoint("userinfo")?,
            end_session_url: endpoint("logout")?,
            redirect_uri,
            scopes: vec!["openid".into(), "profile".into()],
        })
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = url;
        self
    }

    #[must_use]
    pub fn with_end_session_url(mut self, url: Url) -> Self {
        self.end_session_url = url;
        self
    }

    /// Override the requested scopes (default: `["openid", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn userinfo_url(&self) -> &Url {
        &self.userinfo_url
    }

    #[must_use]
    pub fn end_session_url(&self) -> &Url {
        &self.end_session_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Authorization URL plus the values that must be kept until the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub pkce: PkceChallenge,
    pub redirect_uri: Url,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Userinfo document of the logged-in account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserProfile {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl UserProfile {
    /// "First Last", falling back to the username, then the subject.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.given_name.as_deref().unwrap_or_default(),
            self.family_name.as_deref().unwrap_or_default()
        );
        let full = full.trim();
        if !full.is_empty() {
            return full.to_owned();
        }
        self.preferred_username
            .clone()
            .unwrap_or_else(|| self.sub.clone())
    }
}

/// HTTP client for the identity provider's OIDC endpoints.
pub struct AuthClient {
    config: OidcConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Build an authorization URL with fresh `state` and PKCE parameters.
    #[must_use]
    pub fn authorization_url(&self, options: &LoginOptions) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let pkce = PkceChallenge::generate();
        let redirect_uri = options
            .redirect_uri
            .clone()
            .unwrap_or_else(|| self.config.redirect_uri.clone());
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("state", &state)
                .append_pair("code_challenge", pkce.challenge())
                .append_pair("code_challenge_method", pkce.method())
                .append_pair("scope", &scope);
            if let Some(hint) = &options.login_hint {
                query.append_pair("login_hint", hint);
            }
            if let Some(prompt) = &options.prompt {
                query.append_pair("prompt", prompt);
            }
        }

        AuthorizationRequest {
            url,
            state,
            pkce,
            redirect_uri,
        }
    }

    /// Exchange an authorization code for tokens using PKCE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the token endpoint returns an error.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &Url,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        self.token_request(&params, "token exchange").await
    }

    /// Obtain a new token set with a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the refresh token was rejected.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        self.token_request(&params, "token refresh").await
    }

    /// Fetch the userinfo document for `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the userinfo endpoint returns an error.
    pub async fn user_info(&self, access_token: &str) -> Result<UserProfile, Error> {
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "userinfo request").await?;
        response.json::<UserProfile>().await.map_err(Into::into)
    }

    /// RP-initiated logout URL.
    #[must_use]
    pub fn end_session_url(&self, id_token_hint: Option<&str>, redirect_uri: Option<&Url>) -> Url {
        let mut url = self.config.end_session_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            if let Some(redirect) = redirect_uri {
                query.append_pair("post_logout_redirect_uri", redirect.as_str());
            }
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }
        url
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(params)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Non-2xx answers become [`Error::OAuth`], preferring the RFC 6749
    /// `error_description` and `error` fields over the raw body.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status.as_u16()),
            detail: oauth_error_detail(&body),
        })
    }
}

fn oauth_error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        error_description: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error_description: Some(description),
            ..
        }) if !description.is_empty() => description,
        Ok(ErrorBody {
            error: Some(error), ..
        }) if !error.is_empty() => error,
        _ => body.to_owned(),
    }
}
