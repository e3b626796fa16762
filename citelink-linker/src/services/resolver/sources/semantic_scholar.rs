//! Semantic Scholar open-access PDF search

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::LinkSource;
use crate::services::resolver::http::{url_with_params, url_with_path, HttpFetch, SourceError, Throttle};
use crate::services::resolver::query::CitationQuery;

const SEMANTIC_SCHOLAR_API: &str = "https://api.semanticscholar.org/graph/v1";
const PAPER_FIELDS: &str = "openAccessPdf,isOpenAccess";
const SEARCH_FIELDS: &str = "openAccessPdf,isOpenAccess,title";
const SEARCH_LIMIT: &str = "3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    #[serde(default)]
    is_open_access: bool,
    open_access_pdf: Option<OpenAccessPdf>,
}

impl Paper {
    fn pdf_url(self) -> Option<String> {
        if !self.is_open_access {
            return None;
        }
        self.open_access_pdf
            .and_then(|pdf| pdf.url)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

/// Paper lookup by DOI, then title search over the top candidates
pub struct SemanticScholarSource {
    fetcher: Arc<dyn HttpFetch>,
    throttle: Throttle,
}

impl SemanticScholarSource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, spacing: Duration) -> Self {
        Self {
            fetcher,
            throttle: Throttle::every(spacing),
        }
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<String>, SourceError> {
        let url = url_with_path(
            &format!("{}/paper", SEMANTIC_SCHOLAR_API),
            &format!("DOI:{}", doi),
            &[("fields", PAPER_FIELDS)],
        )?;

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let paper: Paper = response.json()?;
        Ok(paper.pdf_url())
    }

    async fn search(&self, cleaned: &str) -> Result<Option<String>, SourceError> {
        let url = url_with_params(
            &format!("{}/paper/search", SEMANTIC_SCHOLAR_API),
            &[
                ("query", cleaned),
                ("limit", SEARCH_LIMIT),
                ("fields", SEARCH_FIELDS),
            ],
        )?;

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let results: SearchResponse = response.json()?;
        Ok(results.data.into_iter().find_map(Paper::pdf_url))
    }
}

#[async_trait]
impl LinkSource for SemanticScholarSource {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn find_link(&self, query: &CitationQuery) -> Result<Option<String>, SourceError> {
        if let Some(doi) = &query.doi {
            match self.lookup_doi(doi).await {
                Ok(Some(url)) => return Ok(Some(url)),
                Ok(None) => {}
                // Unknown DOI still leaves the title search
                Err(e) => tracing::debug!(doi = %doi, error = %e, "Semantic Scholar DOI lookup failed"),
            }
        }

        if query.cleaned.is_empty() {
            return Ok(None);
        }
        self.search(&query.cleaned).await
    }
}
