//! Loopback routes that complete interactive OIDC login for an [`OidcSession`].
//!
//! Desktop and CLI hosts run these on a local listener and point the
//! identity provider's redirect URI at `/callback`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bpm_console::callback::{CallbackSettings, login_routes};
//!
//! let session = Arc::new(config.oidc_session()?);
//! let app = login_routes(session.clone(), CallbackSettings::default());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4200").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`OidcSession`]: crate::session::OidcSession

mod error;
mod routes;
mod settings;

pub use error::CallbackError;
pub use routes::login_routes;
pub use settings::CallbackSettings;
