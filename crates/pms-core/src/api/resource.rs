use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::payload::Payload;
use super::request::ApiRequest;
use super::transport::Transport;

/// List endpoints answer with a bare array or a paginated page.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated { results: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Plain(items) => items,
            ListResponse::Paginated { results } => results,
        }
    }
}

/// CRUD client for one resource collection under a fixed base path.
pub struct Resource<T> {
    transport: Arc<dyn Transport>,
    base_path: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            base_path: self.base_path,
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Resource<T> {
    pub fn new(transport: Arc<dyn Transport>, base_path: &'static str) -> Self {
        Self {
            transport,
            base_path,
            _record: PhantomData,
        }
    }

    pub fn base_path(&self) -> &'static str {
        self.base_path
    }

    pub fn item_path(&self, id: i64) -> String {
        format!("{}{}/", self.base_path, id)
    }

    pub async fn list(&self) -> Result<Vec<T>> {
        self.list_with(&[]).await
    }

    pub async fn list_with(&self, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let response = self
            .transport
            .send(ApiRequest::get(self.base_path).with_query(query))
            .await
            .with_context(|| format!("Failed to list {}", self.base_path))?;
        let page: ListResponse<T> = response
            .json()
            .with_context(|| format!("Failed to parse list from {}", self.base_path))?;
        Ok(page.into_items())
    }

    pub async fn create(&self, payload: Payload) -> Result<T> {
        let request = ApiRequest::post(self.base_path).with_body(payload.into_body());
        self.fetch(request, "create").await
    }

    pub async fn retrieve(&self, id: i64) -> Result<T> {
        self.fetch(ApiRequest::get(self.item_path(id)), "retrieve").await
    }

    pub async fn replace(&self, id: i64, payload: Payload) -> Result<T> {
        let request = ApiRequest::put(self.item_path(id)).with_body(payload.into_body());
        self.fetch(request, "replace").await
    }

    pub async fn partial_update(&self, id: i64, payload: Payload) -> Result<T> {
        let request = ApiRequest::patch(self.item_path(id)).with_body(payload.into_body());
        self.fetch(request, "update").await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let path = self.item_path(id);
        self.transport
            .send(ApiRequest::delete(path.as_str()))
            .await
            .with_context(|| format!("Failed to delete {}", path))?;
        Ok(())
    }

    async fn fetch(&self, request: ApiRequest, action: &str) -> Result<T> {
        let path = request.path.clone();
        let response = self
            .transport
            .send(request)
            .await
            .with_context(|| format!("Failed to {} {}", action, path))?;
        response
            .json()
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}
