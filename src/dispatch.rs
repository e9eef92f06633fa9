use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Response};
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::{NormalizedError, UNKNOWN_ERROR};
use crate::headers::HeaderSet;

/// How a successful response body is meant to be read.
///
/// Declared per endpoint up front; bodies are never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Text,
    Bytes,
    Empty,
}

impl ResponseKind {
    fn accept(self) -> Option<HeaderValue> {
        match self {
            Self::Json => Some(HeaderValue::from_static("application/json")),
            Self::Text => Some(HeaderValue::from_static("text/plain, */*")),
            Self::Bytes => Some(HeaderValue::from_static("*/*")),
            Self::Empty => None,
        }
    }
}

/// Request payload.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    Text(String),
    /// Must be paired with a multipart [`HeaderSet`].
    Multipart(reqwest::multipart::Form),
}

/// Issues exactly one HTTP request per call and normalizes its failures.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    http: reqwest::Client,
}

impl Dispatcher {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Sends `body` to `url` with the given headers.
    ///
    /// No retries: a failure here is final for this call.
    ///
    /// # Errors
    ///
    /// Returns a [`NormalizedError`] for transport failures and for any
    /// non-2xx response.
    pub async fn dispatch(
        &self,
        method: Method,
        url: Url,
        body: RequestBody,
        headers: &HeaderSet,
        expect: ResponseKind,
    ) -> Result<Response, NormalizedError> {
        tracing::debug!(%method, %url, ?expect, "Dispatching request");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers.as_map().clone());
        if let Some(accept) = expect.accept() {
            request = request.header(ACCEPT, accept);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.body(value.to_string()),
            RequestBody::Text(text) => request.body(text),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await.map_err(|e| {
            let err = NormalizedError::transport(e.to_string());
            tracing::error!(%method, %url, error = %err, "Request failed");
            err
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let err = normalize_response(response).await;
        tracing::error!(%method, %url, error = %err, "Request failed");
        Err(err)
    }
}

/// Turns a non-success response into a [`NormalizedError`].
pub(crate) async fn normalize_response(response: Response) -> NormalizedError {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_owned();
    let body = response.text().await.unwrap_or_default();
    NormalizedError::response(status.as_u16(), status_text, backend_message(&body))
}

/// Prefers a JSON body's `error` field, then the raw body.
pub(crate) fn backend_message(body: &str) -> String {
    if body.trim().is_empty() {
        return UNKNOWN_ERROR.to_owned();
    }
    match serde_json::from_str::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) => match map.get("error") {
            Some(JsonValue::String(message)) if !message.is_empty() => message.clone(),
            Some(JsonValue::Null) | Some(JsonValue::String(_)) | None => body.to_owned(),
            Some(other) => other.to_string(),
        },
        _ => body.to_owned(),
    }
}
