//! Web search provider client (Tavily-style API).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchSettings;
use crate::error::Result;

const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

/// Longest snippet kept per result after cleaning.
const MAX_CONTENT_LEN: usize = 400;

/// Results scored below this are dropped as irrelevant.
const MIN_SCORE: f64 = 0.1;

/// Search API client.
pub struct SearchClient {
    settings: SearchSettings,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    query: String,
    #[serde(default)]
    results: Vec<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// Cleaned search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub answer: String,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

impl SearchClient {
    pub fn new(settings: SearchSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { settings, http })
    }

    /// Execute one search and clean the results.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        debug!(
            query,
            depth = %self.settings.search_depth,
            max_results = self.settings.max_results,
            "sending search request"
        );

        let request = ApiRequest {
            api_key: &self.settings.api_key,
            query,
            search_depth: &self.settings.search_depth,
            include_answer: true,
            max_results: self.settings.max_results,
        };

        let response: ApiResponse = self
            .http
            .post(SEARCH_ENDPOINT)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let cleaned = clean_results(response);
        debug!(
            results = cleaned.results.len(),
            has_answer = !cleaned.answer.is_empty(),
            "search completed"
        );
        Ok(cleaned)
    }
}

/// Drop empty and low-relevance results, and truncate long snippets.
fn clean_results(raw: ApiResponse) -> SearchResponse {
    let results = raw
        .results
        .into_iter()
        .filter(|r| !r.content.trim().is_empty() && r.score >= MIN_SCORE)
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            content: truncate(&r.content, MAX_CONTENT_LEN),
            score: r.score,
        })
        .collect();

    SearchResponse {
        query: raw.query,
        answer: raw.answer.unwrap_or_default(),
        results,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}
