// ABOUTME: Async HTTP client for the website's post and resource API
// ABOUTME: Handles throttling, auth headers, and per-request error mapping

use crate::model::{PostRecord, PostUpdate, Resource};
use crate::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://404wolf.com";

/// The website's side of a sync.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_post_ids(&self) -> Result<Vec<String>>;

    /// Fails with [`Error::NotFound`] for a stale id.
    async fn get_post(&self, id: &str) -> Result<PostRecord>;

    /// Fails with [`Error::Fetch`] when the bytes cannot be retrieved.
    async fn get_resource_bytes(&self, resource: &Resource) -> Result<Vec<u8>>;

    async fn store_post_update(&self, id: &str, update: &PostUpdate) -> Result<()>;

    async fn store_resource(&self, post_id: &str, filename: &str, bytes: Vec<u8>) -> Result<Resource>;
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    // Find a valid UTF-8 boundary at or before max_chars
    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    throttle_min: u64,
    throttle_max: u64,
}

impl ApiClient {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION"), " (Rust)"))
            .build()?;

        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            throttle_min: 100,
            throttle_max: 300,
        })
    }

    pub fn with_throttle(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.throttle_min = min_ms;
        self.throttle_max = max_ms;
        self
    }

    pub fn disable_throttle(mut self) -> Self {
        self.throttle_min = 0;
        self.throttle_max = 0;
        self
    }

    async fn throttle(&self) {
        if self.throttle_max > 0 {
            let sleep_ms = rand::thread_rng().gen_range(self.throttle_min..=self.throttle_max);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        debug!(endpoint, "request");
        let response = self.authorized(request).send().await?;

        self.throttle().await;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                message: truncate_str(&message, 100),
            });
        }
        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, endpoint: &str, response: Response) -> Result<T> {
        // Get response text for better error messages
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(endpoint, body = %truncate_str(&body, 500), "unparseable response");
            Error::Parse(e)
        })
    }
}

#[async_trait]
impl RemoteStore for ApiClient {
    async fn list_post_ids(&self) -> Result<Vec<String>> {
        let endpoint = "/api/posts/ids";
        let response = self.send(endpoint, self.client.get(self.url(endpoint))).await?;
        self.json(endpoint, response).await
    }

    async fn get_post(&self, id: &str) -> Result<PostRecord> {
        let endpoint = format!("/api/posts/{}", id);
        match self.send(&endpoint, self.client.get(self.url(&endpoint))).await {
            Ok(response) => self.json(&endpoint, response).await,
            Err(Error::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(Error::NotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_resource_bytes(&self, resource: &Resource) -> Result<Vec<u8>> {
        let address = if resource.url.is_empty() {
            format!("/api/resources/{}", resource.id)
        } else {
            resource.url.clone()
        };
        let fetch_error = |message: String| Error::Fetch {
            address: address.clone(),
            message,
        };

        let response = self
            .send(&address, self.client.get(self.url(&address)))
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn store_post_update(&self, id: &str, update: &PostUpdate) -> Result<()> {
        let endpoint = format!("/api/posts/{}", id);
        let request = self.client.patch(self.url(&endpoint)).json(update);
        match self.send(&endpoint, request).await {
            Ok(_) => Ok(()),
            Err(Error::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(Error::NotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn store_resource(&self, post_id: &str, filename: &str, bytes: Vec<u8>) -> Result<Resource> {
        let endpoint = format!("/api/posts/{}/resources", post_id);
        let request = self
            .client
            .post(self.url(&endpoint))
            .query(&[("filename", filename)])
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        let response = self.send(&endpoint, request).await?;
        self.json(&endpoint, response).await
    }
}
