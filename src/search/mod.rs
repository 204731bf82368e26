//! Search collaborator
//!
//! Read-only free-text search over links. The index is maintained outside
//! this crate; the core only queries it.

mod hosted;

pub use hosted::HostedSearchClient;

use crate::error::Result;
use crate::guard::Route;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(rename = "query")]
    pub text: String,
    pub page: u32,
    pub hits_per_page: u32,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, hits_per_page: u32) -> Self {
        Self {
            text: text.into(),
            page: 0,
            hits_per_page,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// One ranked link
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub object_id: String,
    pub description: String,
    pub url: String,
    pub categories: Vec<String>,
    pub posted_by: String,
    pub created_at: Option<DateTime<Utc>>,
    pub comment_count: usize,
}

impl SearchHit {
    /// Where selecting this hit leads
    pub fn route(&self) -> Route {
        Route::LinkDetail(self.object_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,
    pub page: u32,
    pub pages: u32,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults>;
}

#[derive(Debug, Default, Deserialize)]
struct RawPoster {
    #[serde(rename = "displayName", alias = "name", default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    posted_by: RawPoster,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    comments: Vec<serde_json::Value>,
}

impl From<RawHit> for SearchHit {
    fn from(raw: RawHit) -> Self {
        Self {
            object_id: raw.object_id,
            description: raw.description,
            url: raw.url,
            categories: raw.categories,
            posted_by: raw.posted_by.display_name,
            created_at: raw.created_at.and_then(DateTime::from_timestamp_millis),
            comment_count: raw.comments.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResults {
    #[serde(default)]
    hits: Vec<RawHit>,
    #[serde(default)]
    nb_hits: u64,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    nb_pages: u32,
}

impl From<RawResults> for SearchResults {
    fn from(raw: RawResults) -> Self {
        Self {
            hits: raw.hits.into_iter().map(SearchHit::from).collect(),
            total_hits: raw.nb_hits,
            page: raw.page,
            pages: raw.nb_pages,
        }
    }
}

/// Parse a hosted index response body
pub(crate) fn parse_results(body: &str) -> Result<SearchResults> {
    let raw: RawResults = serde_json::from_str(body)?;
    Ok(raw.into())
}
