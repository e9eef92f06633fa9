use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use bpm_console::callback::{CallbackSettings, login_routes};
use bpm_console::{AuthClient, OidcConfig, OidcSession, SessionHolder};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde_json::json;
use url::Url;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn spawn_identity_provider() -> SocketAddr {
    let app = Router::new().route(
        "/realms/test/protocol/openid-connect/token",
        post(|| async {
            axum::Json(json!({
                "access_token": "opaque-access",
                "expires_in": 300,
                "refresh_token": "refresh-1",
                "id_token": "id-1",
            }))
        }),
    );
    serve(app).await
}

struct Harness {
    base: String,
    http: reqwest::Client,
    session: Arc<OidcSession>,
}

impl Harness {
    async fn start(settings: CallbackSettings) -> Self {
        let idp = spawn_identity_provider().await;
        let config = OidcConfig::new(
            format!("http://{idp}").parse().unwrap(),
            "test",
            "angularid",
            "http://localhost:4200/callback".parse().unwrap(),
        )
        .unwrap();
        let session = Arc::new(OidcSession::new(AuthClient::new(config)));
        let addr = serve(login_routes(session.clone(), settings)).await;

        Self {
            base: format!("http://{addr}"),
            http: reqwest::Client::builder()
                .redirect(Policy::none())
                .build()
                .unwrap(),
            session,
        }
    }

    async fn redirect(&self, method: reqwest::Method, path: &str) -> String {
        let response = self
            .http
            .request(method, format!("{}{path}", self.base))
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header")
            .to_owned()
    }

    async fn begin_login(&self) -> Url {
        let location = self.redirect(reqwest::Method::GET, "/login").await;
        location.parse().expect("absolute authorization url")
    }
}

fn state_of(url: &Url) -> String {
    let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
    query.get("state").cloned().expect("state parameter")
}

#[tokio::test]
async fn login_redirects_to_identity_provider() {
    let harness = Harness::start(CallbackSettings::default()).await;

    let url = harness.begin_login().await;

    assert_eq!(url.path(), "/realms/test/protocol/openid-connect/auth");
    let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(query.get("client_id").map(String::as_str), Some("angularid"));
    assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
    assert!(query.contains_key("code_challenge"));
}

#[tokio::test]
async fn callback_completes_login() {
    let harness = Harness::start(CallbackSettings::default().with_login_redirect("/home")).await;
    let state = state_of(&harness.begin_login().await);

    let location = harness
        .redirect(
            reqwest::Method::GET,
            &format!("/callback?code=abc&state={state}"),
        )
        .await;

    assert_eq!(location, "/home");
    assert!(harness.session.is_logged_in().await.unwrap());
    assert_eq!(
        harness.session.token().await.unwrap().as_deref(),
        Some("opaque-access")
    );
}

#[tokio::test]
async fn callback_with_wrong_state_fails() {
    let harness = Harness::start(CallbackSettings::default()).await;
    harness.begin_login().await;

    let location = harness
        .redirect(reqwest::Method::GET, "/callback?code=abc&state=forged")
        .await;

    assert_eq!(location, "/login-error?error=login_failed");
    assert!(!harness.session.is_logged_in().await.unwrap());
}

#[tokio::test]
async fn provider_error_is_forwarded() {
    let harness = Harness::start(CallbackSettings::default()).await;

    let location = harness
        .redirect(
            reqwest::Method::GET,
            "/callback?error=access_denied&error_description=User%20cancelled",
        )
        .await;

    assert_eq!(
        location,
        "/login-error?error=login_rejected&error_description=User%20cancelled"
    );
}

#[tokio::test]
async fn logout_ends_session_at_provider() {
    let settings = CallbackSettings::default()
        .with_base_path("/auth")
        .with_logout_redirect("http://localhost:4200/".parse().unwrap());
    let harness = Harness::start(settings).await;

    let state = state_of(&{
        let location = harness.redirect(reqwest::Method::GET, "/auth/login").await;
        location.parse::<Url>().unwrap()
    });
    harness
        .redirect(
            reqwest::Method::GET,
            &format!("/auth/callback?code=abc&state={state}"),
        )
        .await;
    assert!(harness.session.is_logged_in().await.unwrap());

    let location: Url = harness
        .redirect(reqwest::Method::POST, "/auth/logout")
        .await
        .parse()
        .unwrap();

    assert_eq!(location.path(), "/realms/test/protocol/openid-connect/logout");
    let query: HashMap<_, _> = location.query_pairs().into_owned().collect();
    assert_eq!(query.get("id_token_hint").map(String::as_str), Some("id-1"));
    assert_eq!(
        query.get("post_logout_redirect_uri").map(String::as_str),
        Some("http://localhost:4200/")
    );
    assert!(!harness.session.is_logged_in().await.unwrap());
}
