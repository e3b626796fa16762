//! External link sources
//!
//! Every source answers one question, "where is a readable copy of this
//! citation?", and reports failures as [`SourceError`] for the waterfall to
//! log and skip.

pub mod core_search;
pub mod crossref;
pub mod open_library;
pub mod semantic_scholar;
pub mod unpaywall;

use async_trait::async_trait;

use super::http::SourceError;
use super::query::CitationQuery;

pub use core_search::CoreSource;
pub use crossref::CrossrefLookup;
pub use open_library::OpenLibrarySource;
pub use semantic_scholar::SemanticScholarSource;
pub use unpaywall::UnpaywallSource;

/// Finds a document link for a citation
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Stable name recorded in `attempted_sources`
    fn name(&self) -> &'static str;

    /// False when a precondition (credential, contact address) is missing;
    /// unavailable sources are skipped without being recorded as attempted
    fn is_available(&self) -> bool {
        true
    }

    async fn find_link(&self, query: &CitationQuery) -> Result<Option<String>, SourceError>;
}

/// Finds a persistent identifier (DOI) for a citation
#[async_trait]
pub trait IdentifierLookup: Send + Sync {
    fn name(&self) -> &'static str;

    async fn find_identifier(&self, cleaned_query: &str) -> Result<Option<String>, SourceError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::super::http::{HttpFetch, HttpResponse, SourceError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Canned responses matched by URL prefix, first match wins
    #[derive(Default)]
    pub struct FakeFetcher {
        routes: Vec<(String, HttpResponse)>,
        head_routes: Vec<(String, u16)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(mut self, prefix: &str, status: u16, body: &str) -> Self {
            self.routes
                .push((prefix.to_string(), HttpResponse::new(status, body)));
            self
        }

        pub fn head_route(mut self, prefix: &str, status: u16) -> Self {
            self.head_routes.push((prefix.to_string(), status));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpFetch for FakeFetcher {
        async fn get(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
        ) -> Result<HttpResponse, SourceError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.routes
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| SourceError::Network(format!("no route for {}", url)))
        }

        async fn head(&self, url: &str) -> Result<u16, SourceError> {
            self.calls.lock().unwrap().push(format!("HEAD {}", url));
            Ok(self
                .head_routes
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, status)| *status)
                .unwrap_or(404))
        }
    }
}
