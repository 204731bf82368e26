//! Configuration for the linkboard client

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Collection names in the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionNames {
    #[serde(default = "default_links")]
    pub links: String,

    #[serde(default = "default_categories")]
    pub categories: String,

    #[serde(default = "default_users")]
    pub users: String,
}

fn default_links() -> String {
    "links".to_string()
}

fn default_categories() -> String {
    "categories".to_string()
}

fn default_users() -> String {
    "users".to_string()
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            links: default_links(),
            categories: default_categories(),
            users: default_users(),
        }
    }
}

/// Hosted search index settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Application id of the hosted index
    #[serde(default)]
    pub app_id: String,

    /// Search-only API key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default = "default_hits_per_page")]
    pub hits_per_page: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the `https://{app_id}-dsn.algolia.net` base URL
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_index_name() -> String {
    "links".to_string()
}

fn default_hits_per_page() -> u32 {
    20
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            index_name: default_index_name(),
            hits_per_page: default_hits_per_page(),
            timeout_secs: default_timeout_secs(),
            endpoint: None,
        }
    }
}

impl SearchConfig {
    /// Base URL of the index query API
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-dsn.algolia.net", self.app_id),
        }
    }
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub collections: CollectionNames,

    /// Buffer of the flash topic; slow consumers lag past this
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// Passwords shorter than this are rejected as weak
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,

    #[serde(default)]
    pub search: SearchConfig,

    /// tracing EnvFilter directive
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_notification_capacity() -> usize {
    16
}

fn default_min_password_len() -> usize {
    6
}

fn default_log_filter() -> String {
    "linkboard_client=info".to_string()
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            collections: CollectionNames::default(),
            notification_capacity: default_notification_capacity(),
            min_password_len: default_min_password_len(),
            search: SearchConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl BoardConfig {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::BoardError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            crate::error::BoardError::Config(format!(
                "Failed to write {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }
}
