use std::path::PathBuf;
use std::sync::Arc;

use time::Duration;
use url::Url;

use crate::client::ApiClient;
use crate::error::Error;
use crate::headers::REFRESH_THRESHOLD;
#[cfg(feature = "oidc")]
use crate::oauth::{AuthClient, OidcConfig};
use crate::session::SessionHolder;
#[cfg(feature = "oidc")]
use crate::session::OidcSession;
use crate::store::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Console client configuration.
///
/// Use [`from_env()`](ConsoleConfig::from_env) for convention-based setup,
/// or [`new()`](ConsoleConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ConsoleConfig {
    pub(crate) api_url: Url,
    #[cfg(feature = "oidc")]
    pub(crate) oidc: Option<OidcConfig>,
    pub(crate) token_store_path: Option<PathBuf>,
    pub(crate) refresh_threshold: Duration,
}

impl ConsoleConfig {
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            #[cfg(feature = "oidc")]
            oidc: None,
            token_store_path: None,
            refresh_threshold: REFRESH_THRESHOLD,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CONSOLE_API_URL`: backend base URL
    ///
    /// # Optional env vars
    /// - `OIDC_SERVER_URL`, `OIDC_REALM`, `OIDC_CLIENT_ID`, `OIDC_REDIRECT_URI`:
    ///   identity provider settings; all four or none
    /// - `OIDC_SCOPES`: comma-separated scopes
    /// - `TOKEN_STORE_PATH`: JSON file persisting the session token
    /// - `TOKEN_REFRESH_THRESHOLD_SECS`: refresh tokens expiring sooner than this
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_url = lookup("CONSOLE_API_URL")
            .ok_or_else(|| Error::Config("CONSOLE_API_URL is required".into()))?;
        let mut config = Self::new(parse_url("CONSOLE_API_URL", &api_url)?);

        #[cfg(feature = "oidc")]
        if let Some(oidc) = oidc_from_lookup(&lookup)? {
            config = config.with_oidc(oidc);
        }

        if let Some(path) = lookup("TOKEN_STORE_PATH") {
            config = config.with_token_store_path(path);
        }

        if let Some(secs) = lookup("TOKEN_REFRESH_THRESHOLD_SECS") {
            let secs: i64 = secs.trim().parse().map_err(|e| {
                Error::Config(format!("TOKEN_REFRESH_THRESHOLD_SECS: {e}"))
            })?;
            if secs < 0 {
                return Err(Error::Config(
                    "TOKEN_REFRESH_THRESHOLD_SECS must not be negative".into(),
                ));
            }
            config = config.with_refresh_threshold(Duration::seconds(secs));
        }

        Ok(config)
    }

    #[cfg(feature = "oidc")]
    #[must_use]
    pub fn with_oidc(mut self, oidc: OidcConfig) -> Self {
        self.oidc = Some(oidc);
        self
    }

    #[must_use]
    pub fn with_token_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[cfg(feature = "oidc")]
    #[must_use]
    pub fn oidc(&self) -> Option<&OidcConfig> {
        self.oidc.as_ref()
    }

    #[must_use]
    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    /// File store at `TOKEN_STORE_PATH`, or an in-memory store.
    #[must_use]
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        match &self.token_store_path {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        }
    }

    /// Identity-provider session, restored from the configured token store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without OIDC settings, or the store's error.
    #[cfg(feature = "oidc")]
    pub fn oidc_session(&self) -> Result<OidcSession, Error> {
        let oidc = self
            .oidc
            .clone()
            .ok_or_else(|| Error::Config("OIDC settings are not configured".into()))?;
        OidcSession::restore(AuthClient::new(oidc), self.token_store())
    }

    /// API client for `session` with this configuration's URL and threshold.
    #[must_use]
    pub fn api_client<S: SessionHolder>(&self, session: Arc<S>) -> ApiClient<S> {
        ApiClient::new(self.api_url.clone(), session)
            .with_refresh_threshold(self.refresh_threshold)
    }
}

#[cfg(feature = "oidc")]
fn oidc_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<OidcConfig>, Error> {
    const KEYS: [&str; 4] = [
        "OIDC_SERVER_URL",
        "OIDC_REALM",
        "OIDC_CLIENT_ID",
        "OIDC_REDIRECT_URI",
    ];

    let (server, realm, client_id, redirect) = match KEYS.map(|key| lookup(key)) {
        [None, None, None, None] => return Ok(None),
        [Some(server), Some(realm), Some(client_id), Some(redirect)] => {
            (server, realm, client_id, redirect)
        }
        values => {
            let missing = KEYS
                .iter()
                .zip(values)
                .find_map(|(key, value)| value.is_none().then_some(*key))
                .unwrap_or(KEYS[0]);
            return Err(Error::Config(format!(
                "{missing} is required when OIDC is configured"
            )));
        }
    };

    let mut config = OidcConfig::new(
        parse_url("OIDC_SERVER_URL", &server)?,
        &realm,
        client_id,
        parse_url("OIDC_REDIRECT_URI", &redirect)?,
    )?;
    if let Some(scopes) = lookup("OIDC_SCOPES") {
        let scopes = scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        config = config.with_scopes(scopes);
    }
    Ok(Some(config))
}

fn parse_url(key: &str, value: &str) -> Result<Url, Error> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}
