//! CORE aggregator search
//!
//! Works without a key at a low anonymous rate; a configured API key is sent
//! as a bearer token.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::LinkSource;
use crate::services::resolver::http::{url_with_params, HttpFetch, SourceError, Throttle};
use crate::services::resolver::query::CitationQuery;

const CORE_SEARCH_URL: &str = "https://api.core.ac.uk/v3/search/works";
const SEARCH_LIMIT: &str = "5";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Work {
    download_url: Option<String>,
    #[serde(default)]
    links: Vec<WorkLink>,
}

#[derive(Debug, Deserialize)]
struct WorkLink {
    #[serde(rename = "type")]
    link_type: Option<String>,
    url: Option<String>,
}

impl Work {
    fn pdf_url(self) -> Option<String> {
        if let Some(url) = self.download_url.filter(|u| u.ends_with(".pdf")) {
            return Some(url);
        }

        self.links.into_iter().find_map(|link| {
            let url = link.url.filter(|u| !u.is_empty())?;
            let is_download = link.link_type.as_deref() == Some("download");
            (is_download || url.contains(".pdf")).then_some(url)
        })
    }
}

/// CORE full-text search by DOI or cleaned citation text
pub struct CoreSource {
    fetcher: Arc<dyn HttpFetch>,
    throttle: Throttle,
    api_key: Option<String>,
}

impl CoreSource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, spacing: Duration, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            throttle: Throttle::every(spacing),
            api_key,
        }
    }
}

#[async_trait]
impl LinkSource for CoreSource {
    fn name(&self) -> &'static str {
        "core"
    }

    async fn find_link(&self, query: &CitationQuery) -> Result<Option<String>, SourceError> {
        let term = query.doi.as_deref().unwrap_or(&query.cleaned);
        if term.is_empty() {
            return Ok(None);
        }

        let url = url_with_params(CORE_SEARCH_URL, &[("q", term), ("limit", SEARCH_LIMIT)])?;

        let authorization = self.api_key.as_ref().map(|key| format!("Bearer {}", key));
        let headers: Vec<(&str, &str)> = authorization
            .as_deref()
            .map(|value| vec![("Authorization", value)])
            .unwrap_or_default();

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &headers).await?.require_success()?;
        let results: SearchResponse = response.json()?;

        Ok(results.results.into_iter().find_map(Work::pdf_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::resolver::sources::testing::FakeFetcher;

    #[tokio::test]
    async fn test_download_url_wins() {
        let fetcher = Arc::new(FakeFetcher::new().route(
            CORE_SEARCH_URL,
            200,
            r#"{"results":[
                {"downloadUrl":"https://core.example.org/page","links":[]},
                {"downloadUrl":"https://core.example.org/paper.pdf"}
            ]}"#,
        ));
        let source = CoreSource::new(fetcher, Duration::ZERO, None);

        let link = source.find_link(&CitationQuery::new("Harvey Condition")).await.unwrap();
        assert_eq!(link.as_deref(), Some("https://core.example.org/paper.pdf"));
    }

    #[tokio::test]
    async fn test_download_typed_link() {
        let fetcher = Arc::new(FakeFetcher::new().route(
            CORE_SEARCH_URL,
            200,
            r#"{"results":[{"downloadUrl":null,"links":[
                {"type":"display","url":"https://core.example.org/display/1"},
                {"type":"download","url":"https://core.example.org/download/1"}
            ]}]}"#,
        ));
        let source = CoreSource::new(fetcher, Duration::ZERO, Some("key".into()));

        let link = source.find_link(&CitationQuery::new("Harvey Condition")).await.unwrap();
        assert_eq!(link.as_deref(), Some("https://core.example.org/download/1"));
    }

    #[tokio::test]
    async fn test_searches_by_doi_when_known() {
        let fetcher = Arc::new(FakeFetcher::new().route(CORE_SEARCH_URL, 200, r#"{"results":[]}"#));
        let source = CoreSource::new(fetcher.clone(), Duration::ZERO, None);
        let query = CitationQuery::new("Smith Theory").with_doi("10.1000/xyz");

        assert_eq!(source.find_link(&query).await.unwrap(), None);
        assert!(fetcher.calls()[0].contains("q=10.1000%2Fxyz"));
    }
}
