use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::Duration;
use url::Url;

use crate::catalog::Collection;
use crate::dispatch::{Dispatcher, RequestBody, ResponseKind};
use crate::error::{Error, NormalizedError};
use crate::headers::HeaderBuilder;
use crate::resource::Resource;
use crate::session::{LoginOptions, SessionHolder};
use crate::upload::UploadFile;

/// Authenticated client for one backend base URL.
///
/// Every call is header acquisition followed by a single dispatch. Without a
/// session the call fails with [`Error::AuthRequired`] and nothing is sent.
pub struct ApiClient<S> {
    base_url: Url,
    dispatcher: Dispatcher,
    headers: HeaderBuilder<S>,
}

impl<S: SessionHolder> ApiClient<S> {
    #[must_use]
    pub fn new(base_url: Url, session: Arc<S>) -> Self {
        Self {
            base_url,
            dispatcher: Dispatcher::default(),
            headers: HeaderBuilder::new(session),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.dispatcher = Dispatcher::new(client);
        self
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.headers = self.headers.with_refresh_threshold(threshold);
        self
    }

    #[must_use]
    pub fn with_login_options(mut self, options: LoginOptions) -> Self {
        self.headers = self.headers.with_login_options(options);
        self
    }

    #[must_use]
    pub fn with_login_trigger(mut self, enabled: bool) -> Self {
        self.headers = self.headers.with_login_trigger(enabled);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn session(&self) -> &Arc<S> {
        self.headers.session()
    }

    /// Typed CRUD access to one of the known backend collections.
    #[must_use]
    pub fn resource<T>(&self, collection: Collection) -> Resource<'_, S, T> {
        let resource = Resource::new(self, collection.path());
        if collection.deletes_as_text() {
            resource.with_text_delete()
        } else {
            resource
        }
    }

    /// Resolves `path` against the base URL, keeping the base's own path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the result is not a valid URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{path}")
        };
        joined
            .parse()
            .map_err(|e| Error::Config(format!("invalid request URL {joined}: {e}")))
    }

    /// One composite operation: build headers, then dispatch.
    ///
    /// # Errors
    ///
    /// [`Error::AuthRequired`] without a session, [`Error::Request`] for
    /// transport failures and non-2xx responses.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        expect: ResponseKind,
    ) -> Result<Response, Error> {
        let url = self.url(path)?;
        let multipart = matches!(body, RequestBody::Multipart(_));
        let headers = self.headers.build(multipart).await.into_result()?;
        Ok(self
            .dispatcher
            .dispatch(method, url, body, &headers, expect)
            .await?)
    }

    /// # Errors
    ///
    /// See [`send`](Self::send); [`Error::Decode`] if the body is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self
            .send(Method::GET, path, RequestBody::Empty, ResponseKind::Json)
            .await?;
        read_json(response).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get_text(&self, path: &str) -> Result<String, Error> {
        let response = self
            .send(Method::GET, path, RequestBody::Empty, ResponseKind::Text)
            .await?;
        read_text(response).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .send(Method::GET, path, RequestBody::Empty, ResponseKind::Bytes)
            .await?;
        let bytes = response.bytes().await.map_err(body_error)?;
        Ok(bytes.to_vec())
    }

    /// # Errors
    ///
    /// See [`send`](Self::send); [`Error::Decode`] for an unserializable body
    /// or an unexpected response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, path, json_body(body)?, ResponseKind::Json)
            .await?;
        read_json(response).await
    }

    /// # Errors
    ///
    /// See [`post_json`](Self::post_json).
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::PUT, path, json_body(body)?, ResponseKind::Json)
            .await?;
        read_json(response).await
    }

    /// POST a JSON body to an endpoint that answers in plain text.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post_json_for_text<B>(&self, path: &str, body: &B) -> Result<String, Error>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .send(Method::POST, path, json_body(body)?, ResponseKind::Text)
            .await?;
        read_text(response).await
    }

    /// PUT a JSON body to an endpoint that answers in plain text.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put_json_for_text<B>(&self, path: &str, body: &B) -> Result<String, Error>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .send(Method::PUT, path, json_body(body)?, ResponseKind::Text)
            .await?;
        read_text(response).await
    }

    /// DELETE, ignoring any response body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.send(Method::DELETE, path, RequestBody::Empty, ResponseKind::Empty)
            .await?;
        Ok(())
    }

    /// DELETE against an endpoint that answers in plain text.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete_text(&self, path: &str) -> Result<String, Error> {
        let response = self
            .send(Method::DELETE, path, RequestBody::Empty, ResponseKind::Text)
            .await?;
        read_text(response).await
    }

    /// POST `file` as the single `file` field of a multipart form.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: UploadFile,
    ) -> Result<T, Error> {
        self.send_multipart(Method::POST, path, file.into_form()?)
            .await
    }

    /// Sends an arbitrary multipart form, decoding a JSON answer.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Form,
    ) -> Result<T, Error> {
        let response = self
            .send(method, path, RequestBody::Multipart(form), ResponseKind::Json)
            .await?;
        read_json(response).await
    }
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody, Error> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| Error::Decode(format!("request body: {e}")))
}

fn body_error(e: reqwest::Error) -> Error {
    Error::Request(NormalizedError::transport(e.to_string()))
}

async fn read_text(response: Response) -> Result<String, Error> {
    response.text().await.map_err(body_error)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await.map_err(body_error)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StoredTokenSession;
    use crate::store::MemoryTokenStore;

    fn client(base: &str) -> ApiClient<StoredTokenSession> {
        let session = Arc::new(StoredTokenSession::new(Arc::new(MemoryTokenStore::new())));
        ApiClient::new(base.parse().unwrap(), session)
    }

    #[test]
    fn url_joins_paths() {
        let c = client("http://localhost:8089");
        assert_eq!(
            c.url("/api/tickets").unwrap().as_str(),
            "http://localhost:8089/api/tickets"
        );

        let c = client("http://localhost:8089/api/");
        assert_eq!(
            c.url("tickets/5").unwrap().as_str(),
            "http://localhost:8089/api/tickets/5"
        );
        assert_eq!(c.url("").unwrap().as_str(), "http://localhost:8089/api");
    }

    #[tokio::test]
    async fn no_session_fails_before_dispatch() {
        // Port 9 (discard) is never contacted: AuthRequired short-circuits first.
        let c = client("http://127.0.0.1:9");
        let err = c.get_json::<serde_json::Value>("resources").await.unwrap_err();
        assert!(err.is_auth_required());
    }
}
