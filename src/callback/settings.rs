use url::Url;

/// Paths and redirect targets of the login callback routes.
#[derive(Debug, Clone)]
pub struct CallbackSettings {
    pub(crate) base_path: String,
    pub(crate) login_redirect: String,
    pub(crate) error_redirect: String,
    pub(crate) logout_redirect: Option<Url>,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            login_redirect: "/".into(),
            error_redirect: "/login-error".into(),
            logout_redirect: None,
        }
    }
}

impl CallbackSettings {
    /// Prefix for `/login`, `/callback` and `/logout` (default: none).
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into().trim_end_matches('/').to_owned();
        self
    }

    /// Where to land after a successful login.
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.login_redirect = path.into();
        self
    }

    /// Where to land after a failed login; receives `?error=<code>`.
    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.error_redirect = path.into();
        self
    }

    /// `post_logout_redirect_uri` sent to the identity provider.
    #[must_use]
    pub fn with_logout_redirect(mut self, url: Url) -> Self {
        self.logout_redirect = Some(url);
        self
    }

    pub(crate) fn route(&self, name: &str) -> String {
        format!("{}/{name}", self.base_path)
    }
}
