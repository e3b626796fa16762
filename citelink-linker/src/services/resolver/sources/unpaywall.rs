//! Unpaywall open-access lookup by DOI

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::LinkSource;
use crate::services::resolver::http::{url_with_path, HttpFetch, SourceError, Throttle};
use crate::services::resolver::query::CitationQuery;

const UNPAYWALL_URL: &str = "https://api.unpaywall.org/v2";

#[derive(Debug, Deserialize)]
struct UnpaywallRecord {
    #[serde(default)]
    is_oa: bool,
    best_oa_location: Option<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url_for_pdf: Option<String>,
}

/// Unpaywall requires a contact address on every request
pub struct UnpaywallSource {
    fetcher: Arc<dyn HttpFetch>,
    throttle: Throttle,
    contact_email: Option<String>,
}

impl UnpaywallSource {
    pub fn new(fetcher: Arc<dyn HttpFetch>, spacing: Duration, contact_email: Option<String>) -> Self {
        Self {
            fetcher,
            throttle: Throttle::every(spacing),
            contact_email,
        }
    }
}

#[async_trait]
impl LinkSource for UnpaywallSource {
    fn name(&self) -> &'static str {
        "unpaywall"
    }

    fn is_available(&self) -> bool {
        self.contact_email.is_some()
    }

    async fn find_link(&self, query: &CitationQuery) -> Result<Option<String>, SourceError> {
        let (Some(doi), Some(email)) = (&query.doi, &self.contact_email) else {
            return Ok(None);
        };

        let url = url_with_path(UNPAYWALL_URL, doi, &[("email", email.as_str())])?;

        self.throttle.wait().await;
        let response = self.fetcher.get(&url, &[]).await?.require_success()?;
        let record: UnpaywallRecord = response.json()?;

        if !record.is_oa {
            return Ok(None);
        }

        Ok(record
            .best_oa_location
            .and_then(|location| location.url_for_pdf)
            .filter(|url| !url.is_empty()))
    }
}
