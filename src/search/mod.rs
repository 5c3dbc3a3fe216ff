// Web search fallback
// Used when the knowledge base has no answer

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::providers::{build_agent, provider_error, send_with_retry};
use crate::{AssistError, Result as AssistResult};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// One web page returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// A web search engine
pub trait WebSearch: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> AssistResult<Vec<WebResult>>;
}

/// Client for the Tavily search API
#[derive(Debug, Clone)]
pub struct TavilyClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResponseItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseItem {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    #[inline]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: TAVILY_BASE_URL.to_string(),
            api_key: api_key.into(),
            agent: build_agent(Duration::from_secs(30)),
            retry_attempts: 1,
        }
    }

    /// Build a client from the `[search]` section
    ///
    /// Returns `None` when search is disabled or the key is not set.
    #[inline]
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.search.enabled {
            return None;
        }
        match std::env::var(&config.search.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(
                Self::new(key)
                    .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))
                    .with_retry_attempts(config.llm.retry_attempts),
            ),
            _ => {
                info!(
                    "Web search disabled: {} is not set",
                    config.search.api_key_env
                );
                None
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    fn request(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        let url = self.search_url();
        let request = SearchRequest {
            query,
            max_results,
            search_depth: "basic",
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize search request")?;

        debug!("Searching the web for {:?}", query);

        let response_text = send_with_retry(&url, self.retry_attempts, || {
            self.agent
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to search the web")?;

        let response: SearchResponse =
            serde_json::from_str(&response_text).context("Failed to parse search response")?;

        Ok(response
            .results
            .into_iter()
            .take(max_results)
            .map(|item| WebResult {
                title: item.title,
                url: item.url,
                content: item.content,
            })
            .collect())
    }
}

impl WebSearch for TavilyClient {
    fn search(&self, query: &str, max_results: usize) -> AssistResult<Vec<WebResult>> {
        if max_results == 0 {
            return Err(AssistError::Config(
                "max_results must be greater than zero".to_string(),
            ));
        }
        self.request(query, max_results)
            .map_err(|e| provider_error(&e))
    }
}
