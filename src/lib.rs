#![doc = include_str!("../README.md")]

#[cfg(feature = "callback")]
pub mod callback;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod headers;
#[cfg(feature = "oidc")]
pub mod oauth;
#[cfg(feature = "oidc")]
pub mod pkce;
pub mod resource;
pub mod session;
pub mod store;
pub mod token;
pub mod types;
pub mod upload;

// Re-exports for convenient access
pub use catalog::Collection;
pub use client::ApiClient;
pub use config::ConsoleConfig;
pub use dispatch::{Dispatcher, RequestBody, ResponseKind};
pub use error::{Error, NormalizedError};
pub use headers::{HeaderBuilder, HeaderOutcome, HeaderSet, REFRESH_THRESHOLD};
#[cfg(feature = "oidc")]
pub use oauth::{AuthClient, AuthorizationRequest, OidcConfig, TokenResponse, UserProfile};
#[cfg(feature = "oidc")]
pub use pkce::{PkceChallenge, generate_state};
pub use resource::Resource;
#[cfg(feature = "oidc")]
pub use session::{OidcSession, TokenSet};
pub use session::{LoginOptions, LogoutOptions, SessionHolder, StoredTokenSession};
pub use store::{FileTokenStore, MemoryTokenStore, TOKEN_KEY, TokenStore};
pub use token::{TokenClaims, decode_unverified};
pub use types::{BearerToken, ResourceId};
pub use upload::{MultipartPayload, UploadFile};
