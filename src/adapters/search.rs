//! HTTP research-lookup client.
//!
//! Queries a SearxNG-style metasearch instance (`/search?format=json`) and
//! maps results into Findings. Research treats every failure here as
//! absence of evidence, so this client reports errors plainly and does not
//! retry.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::Finding;

use super::{ResearchLookup, SearchError};

/// SearxNG-style JSON search client.
pub struct HttpSearch {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,

    #[serde(default)]
    content: String,

    #[serde(default)]
    url: String,
}

impl HttpSearch {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ResearchLookup for HttpSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Finding>, SearchError> {
        let response = self
            .client
            .get(format!("{}/search", self.endpoint.trim_end_matches('/')))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let findings: Vec<Finding> = parsed
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .take(limit)
            .map(|r| Finding {
                title: r.title,
                snippet: r.content,
                source_ref: r.url,
            })
            .collect();

        debug!(query, count = findings.len(), "search completed");

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "results": [
                {"title": "Rust book", "content": "Ownership rules", "url": "https://doc.rust-lang.org"},
                {"title": "Empty one", "content": "   ", "url": "https://example.com"}
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Rust book");
    }

    #[test]
    fn test_missing_fields_default() {
        let json = r#"{"results": [{"title": "No content or url"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.results[0].content.is_empty());
        assert!(parsed.results[0].url.is_empty());
    }
}
