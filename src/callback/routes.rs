use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;

use super::error::CallbackError;
use super::settings::CallbackSettings;
use crate::session::{LoginOptions, LogoutOptions, OidcSession, SessionHolder};

#[derive(Clone)]
struct CallbackState {
    session: Arc<OidcSession>,
    settings: Arc<CallbackSettings>,
}

/// Create the login/callback/logout router for `session`.
pub fn login_routes(session: Arc<OidcSession>, settings: CallbackSettings) -> Router {
    let login_path = settings.route("login");
    let callback_path = settings.route("callback");
    let logout_path = settings.route("logout");

    let state = CallbackState {
        session,
        settings: Arc::new(settings),
    };

    Router::new()
        .route(&login_path, get(login))
        .route(&callback_path, get(callback))
        .route(&logout_path, get(logout).post(logout))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login(State(state): State<CallbackState>) -> Result<Redirect, Response> {
    let url = state
        .session
        .login(LoginOptions::default())
        .await
        .map_err(|e| CallbackError::from(e).into_response())?;

    Ok(match url {
        Some(url) => Redirect::to(url.as_str()),
        None => Redirect::to(&state.settings.login_redirect),
    })
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, Response> {
    let error_redirect = state.settings.error_redirect.as_str();

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from identity provider");
        return Err(CallbackError::Rejected(desc.to_owned()).redirect_to(error_redirect));
    }

    let (Some(code), Some(received_state)) = (params.code, params.state) else {
        return Err(
            CallbackError::OAuth("missing code or state".into()).redirect_to(error_redirect),
        );
    };

    state
        .session
        .complete_login(&code, &received_state)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Login completion failed");
            CallbackError::from(e).redirect_to(error_redirect)
        })?;

    Ok(Redirect::to(&state.settings.login_redirect))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(State(state): State<CallbackState>) -> Result<Redirect, Response> {
    let options = match &state.settings.logout_redirect {
        Some(url) => LogoutOptions::default().with_redirect_uri(url.clone()),
        None => LogoutOptions::default(),
    };

    let url = state
        .session
        .logout(options)
        .await
        .map_err(|e| CallbackError::from(e).into_response())?;

    Ok(match url {
        Some(url) => Redirect::to(url.as_str()),
        None => Redirect::to(&state.settings.login_redirect),
    })
}
