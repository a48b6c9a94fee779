//! HTTP JSON client for the restaurant data service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::RemoteService;
use crate::config::ClientConfig;
use crate::models::{Collection, Restaurant, RestaurantId, Review, ReviewId, ReviewPayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

/// `reqwest`-backed [`RemoteService`]
///
/// Favorite updates are sent as `PUT /restaurants/:id?is_favorite=<bool>`
/// with an empty body; review writes carry a JSON body.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    /// Build a client for `base_url` (e.g. `http://localhost:1337`).
    ///
    /// `timeout` bounds each request; `None` waits indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    /// Build a client from the resolved client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.data_service_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.name())
    }

    fn record_url(&self, collection: Collection, id: i64) -> String {
        format!("{}/{}/{id}", self.base_url, collection.name())
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_optional_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<T>().await?))
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
        let url = self.collection_url(Collection::Restaurants);
        tracing::debug!("GET {url}");
        Self::send_json(self.client.get(url)).await
    }

    async fn fetch_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>> {
        let url = self.record_url(Collection::Restaurants, id.get());
        Self::send_optional_json(self.client.get(url)).await
    }

    async fn update_restaurant_favorite(
        &self,
        id: RestaurantId,
        is_favorite: bool,
    ) -> Result<Restaurant> {
        let url = self.record_url(Collection::Restaurants, id.get());
        tracing::debug!("PUT {url}?is_favorite={is_favorite}");
        let request = self
            .client
            .put(url)
            .query(&[("is_favorite", is_favorite.to_string())]);
        Self::send_json(request).await
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>> {
        let url = self.collection_url(Collection::Reviews);
        tracing::debug!("GET {url}");
        Self::send_json(self.client.get(url)).await
    }

    async fn fetch_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let url = self.record_url(Collection::Reviews, id.get());
        Self::send_optional_json(self.client.get(url)).await
    }

    async fn create_review(&self, payload: &ReviewPayload) -> Result<Review> {
        let url = self.collection_url(Collection::Reviews);
        tracing::debug!("POST {url}");
        Self::send_json(self.client.post(url).json(payload)).await
    }

    async fn update_review(&self, id: ReviewId, payload: &ReviewPayload) -> Result<Review> {
        let url = self.record_url(Collection::Reviews, id.get());
        tracing::debug!("PUT {url}");
        Self::send_json(self.client.put(url).json(payload)).await
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let url = self.record_url(Collection::Reviews, id.get());
        tracing::debug!("DELETE {url}");
        let response = self.client.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Review {id} already absent on the data service");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::RemoteRejected {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("data service URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "data service URL must include http:// or https://".to_string(),
        ))
    }
}
