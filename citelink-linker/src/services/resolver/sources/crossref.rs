//! Crossref DOI lookup
//!
//! A DOI match is taken as evidence that the citation is a journal article,
//! which routes it through the academic chain first.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::IdentifierLookup;
use crate::services::resolver::http::{url_with_params, HttpFetch, SourceError, Throttle};

const CROSSREF_WORKS_URL: &str = "https://api.crossref.org/works";

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

/// Crossref bibliographic search
pub struct CrossrefLookup {
    fetcher: Arc<dyn HttpFetch>,
    throttle: Throttle,
    /// Sent as `mailto` to join Crossref's polite pool
    contact_email: Option<String>,
}

impl CrossrefLookup {
    pub fn new(fetcher: Arc<dyn HttpFetch>, spacing: Duration, contact_email: Option<String>) -> Self {
        Self {
            fetcher,
            throttle: Throttle::every(spacing),
            contact_email,
        }
    }
}

#[async_trait]
impl IdentifierLookup for CrossrefLookup {
    fn name(&self) -> &'static str {
        "crossref"
    }

    async fn find_identifier(&self, cleaned_query: &str) -> Result<Option<String>, SourceError> {
        let mut params = vec![("query.bibliographic", cleaned_query), ("rows", "1")];
        if let Some(email) = &self.contact_email {
            params.push(("mailto", email.as_str()));
        }
        let url = url_with_params(CROSSREF_WORKS_URL, &params)?;

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let works: WorksResponse = response.json()?;

        let doi = works
            .message
            .items
            .into_iter()
            .next()
            .and_then(|work| work.doi)
            .filter(|doi| !doi.is_empty());

        if let Some(doi) = &doi {
            tracing::debug!(doi = %doi, "Crossref matched DOI");
        }

        Ok(doi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::resolver::sources::testing::FakeFetcher;

    #[tokio::test]
    async fn test_first_item_doi() {
        let fetcher = Arc::new(FakeFetcher::new().route(
            CROSSREF_WORKS_URL,
            200,
            r#"{"message":{"items":[{"DOI":"10.1000/xyz"},{"DOI":"10.1000/other"}]}}"#,
        ));
        let lookup = CrossrefLookup::new(fetcher.clone(), Duration::ZERO, Some("me@example.org".into()));

        let doi = lookup.find_identifier("theory of everything").await.unwrap();
        assert_eq!(doi.as_deref(), Some("10.1000/xyz"));

        let calls = fetcher.calls();
        assert!(calls[0].contains("query.bibliographic=theory+of+everything"));
        assert!(calls[0].contains("mailto=me%40example.org"));
    }

    #[tokio::test]
    async fn test_no_items() {
        let fetcher = Arc::new(FakeFetcher::new().route(CROSSREF_WORKS_URL, 200, r#"{"message":{"items":[]}}"#));
        let lookup = CrossrefLookup::new(fetcher, Duration::ZERO, None);
        assert_eq!(lookup.find_identifier("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_status() {
        let fetcher = Arc::new(FakeFetcher::new().route(CROSSREF_WORKS_URL, 503, ""));
        let lookup = CrossrefLookup::new(fetcher, Duration::ZERO, None);
        assert!(matches!(
            lookup.find_identifier("x").await,
            Err(SourceError::Status(503))
        ));
    }
}
