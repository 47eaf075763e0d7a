//! HTTP client for a hosted confsync store.
//!
//! The API surface is deliberately small: `GET /files` lists objects,
//! `GET /files/{name}` fetches one, `PUT /files/{name}` upserts, and
//! `DELETE /files/{name}` removes. All requests carry a bearer token.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, info, instrument};

use super::{RemoteEntry, RemoteStore, StoredObject};
use crate::errors::StoreError;

/// Asynchronous client for the hosted store API.
#[derive(Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let token = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("confsync/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        info!(base_url = %base_url, "created HttpStore");
        Self {
            http,
            base_url,
            token,
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url, name)
    }

    async fn check_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::AuthenticationFailed(format!("HTTP {status}")));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RemoteEntry>, StoreError> {
        let url = format!("{}/files", self.base_url);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let resp = self.check_response(resp).await?;
        let entries: Vec<RemoteEntry> = resp.json().await?;
        debug!(count = entries.len(), "listed remote objects");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<Option<StoredObject>, StoreError> {
        let resp = self
            .http
            .get(self.object_url(name))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.check_response(resp).await?;
        let object: StoredObject = resp.json().await?;
        if object.name != name {
            return Err(StoreError::MalformedObject {
                name: name.to_string(),
                detail: format!("store returned object named '{}'", object.name),
            });
        }
        Ok(Some(object))
    }

    #[instrument(skip(self, object), fields(name = %object.name))]
    async fn put(&self, object: &StoredObject) -> Result<(), StoreError> {
        let resp = self
            .http
            .put(self.object_url(&object.name))
            .bearer_auth(&self.token)
            .json(object)
            .send()
            .await?;
        self.check_response(resp).await?;
        debug!(name = %object.name, hash = %object.hash, "uploaded object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .delete(self.object_url(name))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.check_response(resp).await?;
        debug!(name, "deleted object");
        Ok(())
    }
}
