//! Open Library / Internet Archive book lookup
//!
//! Only books flagged as having full text are considered. The read API is
//! asked for a full-access edition first; failing that, the search result's
//! archive identifier is used once a HEAD request confirms the PDF exists.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::LinkSource;
use crate::services::resolver::http::{url_with_params, HttpFetch, SourceError, Throttle};
use crate::services::resolver::query::CitationQuery;

const OPEN_LIBRARY_URL: &str = "https://openlibrary.org";
const ARCHIVE_DOWNLOAD_URL: &str = "https://archive.org/download";
const SEARCH_LIMIT: &str = "5";
const FULL_ACCESS: &str = "full access";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<BookDoc>,
}

#[derive(Debug, Deserialize)]
struct BookDoc {
    #[serde(default)]
    has_fulltext: bool,
    #[serde(default)]
    public_scan_b: bool,
    #[serde(default)]
    edition_key: Vec<String>,
    cover_edition_key: Option<String>,
    #[serde(default)]
    ia: Vec<String>,
}

impl BookDoc {
    fn is_readable(&self) -> bool {
        self.has_fulltext || self.public_scan_b
    }

    fn edition(&self) -> Option<&str> {
        self.edition_key
            .first()
            .map(String::as_str)
            .or(self.cover_edition_key.as_deref())
    }
}

/// Read API response; items appear at the top level and inside records
#[derive(Debug, Default, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    items: Vec<ReadItem>,
    #[serde(default)]
    records: BTreeMap<String, ReadRecord>,
}

#[derive(Debug, Deserialize)]
struct ReadRecord {
    #[serde(default)]
    data: Option<ReadRecordData>,
}

#[derive(Debug, Deserialize)]
struct ReadRecordData {
    #[serde(default)]
    items: Vec<ReadItem>,
}

#[derive(Debug, Deserialize)]
struct ReadItem {
    status: Option<String>,
    #[serde(rename = "itemURL")]
    item_url: Option<String>,
}

impl ReadResponse {
    /// Archive identifier of the first full-access item
    fn full_access_identifier(self) -> Option<String> {
        let record_items = self
            .records
            .into_values()
            .filter_map(|record| record.data)
            .flat_map(|data| data.items);

        self.items
            .into_iter()
            .chain(record_items)
            .filter(|item| item.status.as_deref() == Some(FULL_ACCESS))
            .find_map(|item| {
                let url = item.item_url?;
                let id = url.trim_end_matches('/').rsplit('/').next()?.to_string();
                (!id.is_empty()).then_some(id)
            })
    }
}

fn archive_pdf_url(identifier: &str) -> String {
    format!("{}/{}/{}.pdf", ARCHIVE_DOWNLOAD_URL, identifier, identifier)
}

/// Public-domain and lending-library books
pub struct OpenLibrarySource {
    fetcher: Arc<dyn HttpFetch>,
    throttle: Throttle,
}

impl OpenLibrarySource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, spacing: Duration) -> Self {
        Self {
            fetcher,
            throttle: Throttle::every(spacing),
        }
    }

    async fn full_access_edition(&self, edition: &str) -> Result<Option<String>, SourceError> {
        let url = format!("{}/api/volumes/brief/olid/{}.json", OPEN_LIBRARY_URL, edition);

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let read: ReadResponse = response.json()?;

        Ok(read.full_access_identifier().map(|id| archive_pdf_url(&id)))
    }

    async fn archive_pdf_exists(&self, url: &str) -> bool {
        self.throttle.wait().await;
        match self.fetcher.head(url).await {
            Ok(status) => (200..400).contains(&status),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Archive PDF check failed");
                false
            }
        }
    }
}

#[async_trait]
impl LinkSource for OpenLibrarySource {
    fn name(&self) -> &'static str {
        "open_library"
    }

    async fn find_link(&self, query: &CitationQuery) -> Result<Option<String>, SourceError> {
        if query.cleaned.is_empty() {
            return Ok(None);
        }

        let url = url_with_params(
            &format!("{}/search.json", OPEN_LIBRARY_URL),
            &[("q", query.cleaned.as_str()), ("limit", SEARCH_LIMIT)],
        )?;

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let results: SearchResponse = response.json()?;

        for doc in results.docs.iter().filter(|doc| doc.is_readable()) {
            if let Some(edition) = doc.edition() {
                match self.full_access_edition(edition).await {
                    Ok(Some(pdf)) => return Ok(Some(pdf)),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(edition = %edition, error = %e, "Open Library read API failed")
                    }
                }
            }

            if let Some(identifier) = doc.ia.first() {
                let pdf = archive_pdf_url(identifier);
                if self.archive_pdf_exists(&pdf).await {
                    return Ok(Some(pdf));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::resolver::sources::testing::FakeFetcher;

    const SEARCH_URL: &str = "https://openlibrary.org/search.json";

    #[tokio::test]
    async fn test_full_access_edition() {
        let fetcher = Arc::new(
            FakeFetcher::new()
                .route(
                    SEARCH_URL,
                    200,
                    r#"{"docs":[
                        {"has_fulltext":false,"edition_key":["OL1M"]},
                        {"has_fulltext":true,"edition_key":["OL2M"],"ia":["fallbackid"]}
                    ]}"#,
                )
                .route(
                    "https://openlibrary.org/api/volumes/brief/olid/OL2M.json",
                    200,
                    r#"{"records":{"/books/OL2M":{"data":{"items":[
                        {"status":"restricted","itemURL":"https://archive.org/details/lentid"},
                        {"status":"full access","itemURL":"https://archive.org/details/freeid"}
                    ]}}}}"#,
                ),
        );
        let source = OpenLibrarySource::new(fetcher.clone(), Duration::ZERO);

        let link = source
            .find_link(&CitationQuery::new("Weber Protestant Ethic"))
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("https://archive.org/download/freeid/freeid.pdf"));
        // The unreadable first doc never reaches the read API
        assert!(!fetcher.calls().iter().any(|c| c.contains("OL1M")));
    }

    #[tokio::test]
    async fn test_archive_fallback_requires_head_check() {
        let fetcher = Arc::new(
            FakeFetcher::new()
                .route(
                    SEARCH_URL,
                    200,
                    r#"{"docs":[
                        {"public_scan_b":true,"ia":["missing"]},
                        {"public_scan_b":true,"ia":["present"]}
                    ]}"#,
                )
                .head_route("https://archive.org/download/present/", 200),
        );
        let source = OpenLibrarySource::new(fetcher, Duration::ZERO);

        let link = source
            .find_link(&CitationQuery::new("Durkheim Suicide"))
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("https://archive.org/download/present/present.pdf"));
    }

    #[tokio::test]
    async fn test_no_readable_docs() {
        let fetcher = Arc::new(FakeFetcher::new().route(SEARCH_URL, 200, r#"{"docs":[{"ia":["x"]}]}"#));
        let source = OpenLibrarySource::new(fetcher, Duration::ZERO);
        assert_eq!(
            source.find_link(&CitationQuery::new("Durkheim Suicide")).await.unwrap(),
            None
        );
    }
}
