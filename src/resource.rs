use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::Error;
use crate::session::SessionHolder;
use crate::types::ResourceId;

/// CRUD operations on one REST collection (`GET /path`, `GET /path/{id}`, ...).
pub struct Resource<'a, S, T> {
    client: &'a ApiClient<S>,
    path: String,
    text_delete: bool,
    _item: PhantomData<fn() -> T>,
}

impl<'a, S: SessionHolder, T> Resource<'a, S, T> {
    #[must_use]
    pub fn new(client: &'a ApiClient<S>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into().trim_matches('/').to_owned(),
            text_delete: false,
            _item: PhantomData,
        }
    }

    /// The collection's DELETE answers with a plain-text body.
    #[must_use]
    pub fn with_text_delete(mut self) -> Self {
        self.text_delete = true;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn item_path(&self, id: ResourceId) -> String {
        format!("{}/{id}", self.path)
    }

    /// Deletes one item. Returns the response text for text-mode collections.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`].
    pub async fn delete(&self, id: impl Into<ResourceId>) -> Result<Option<String>, Error> {
        let path = self.item_path(id.into());
        if self.text_delete {
            self.client.delete_text(&path).await.map(Some)
        } else {
            self.client.delete(&path).await.map(|()| None)
        }
    }
}

impl<S: SessionHolder, T: DeserializeOwned> Resource<'_, S, T> {
    /// # Errors
    ///
    /// See [`ApiClient::get_json`].
    pub async fn list(&self) -> Result<Vec<T>, Error> {
        self.client.get_json(&self.path).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::get_json`].
    pub async fn get(&self, id: impl Into<ResourceId>) -> Result<T, Error> {
        self.client.get_json(&self.item_path(id.into())).await
    }
}

impl<S: SessionHolder, T: Serialize + DeserializeOwned> Resource<'_, S, T> {
    /// # Errors
    ///
    /// See [`ApiClient::post_json`].
    pub async fn create(&self, item: &T) -> Result<T, Error> {
        self.client.post_json(&self.path, item).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::put_json`].
    pub async fn update(&self, id: impl Into<ResourceId>, item: &T) -> Result<T, Error> {
        self.client.put_json(&self.item_path(id.into()), item).await
    }
}
