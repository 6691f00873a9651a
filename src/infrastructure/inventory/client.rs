use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use tracing::{debug, instrument};

use super::types::{SearchRequest, SearchResponse};
use crate::domain::errors::RemoteError;
use crate::domain::models::{InventoryConfig, InventoryPage, InventoryQuery, RateLimitConfig};
use crate::domain::ports::InventoryApi;
use crate::infrastructure::monapi::RequestLimiter;

/// reqwest adapter for the inventory search API.
pub struct InventoryClient {
    http: ReqwestClient,
    base_url: String,
    timeout: Duration,
    limiter: RequestLimiter,
}

impl InventoryClient {
    pub fn new(config: &InventoryConfig, rate_limit: &RateLimitConfig) -> Result<Self> {
        let http = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            limiter: RequestLimiter::from_config(rate_limit),
        })
    }

    fn map_transport(&self, err: &reqwest::Error, url: &str) -> RemoteError {
        if err.is_connect() {
            RemoteError::Connection {
                endpoint: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_timeout() {
            let secs = self.timeout.as_secs();
            RemoteError::ReadTimeout {
                timeout_secs: secs,
                ceiling_secs: secs,
            }
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Connection {
                endpoint: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl InventoryApi for InventoryClient {
    #[instrument(skip(self, query), fields(object_type = %query.object_type))]
    async fn fetch_page(
        &self,
        query: &InventoryQuery,
        page: u32,
        page_size: usize,
    ) -> Result<InventoryPage, RemoteError> {
        let url = format!("{}/{}/search", self.base_url, query.object_type);
        let body = SearchRequest {
            fields: &query.fields,
            predicate: query.predicate(),
            page,
            page_size,
        };
        self.limiter.acquire().await;
        debug!(page, page_size, "Fetching inventory page");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.map_transport(&err, &url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|err| self.map_transport(&err, &url))?;
        Ok(InventoryPage::from(parsed))
    }
}
