//! Hosted search index over HTTP

use super::{parse_results, SearchIndex, SearchRequest, SearchResults};
use crate::config::SearchConfig;
use crate::error::{BoardError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub struct HostedSearchClient {
    config: SearchConfig,
    http_client: reqwest::Client,
}

impl HostedSearchClient {
    pub fn new(config: SearchConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("linkboard-client/0.1")
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    pub fn query_url(&self) -> String {
        format!(
            "{}/1/indexes/{}/query",
            self.config.base_url().trim_end_matches('/'),
            self.config.index_name
        )
    }
}

#[async_trait]
impl SearchIndex for HostedSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let url = self.query_url();
        debug!(url = %url, text = %request.text, page = request.page, "Searching");

        let response = self
            .http_client
            .post(&url)
            .header("X-Algolia-Application-Id", &self.config.app_id)
            .header("X-Algolia-API-Key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BoardError::PermissionDenied(format!(
                "search index refused the request (HTTP {})",
                status
            )));
        }
        if !status.is_success() {
            return Err(BoardError::Unavailable(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let body = response.text().await?;
        parse_results(&body)
    }
}
