//! Resolver waterfall over canned HTTP responses and the SQLite cache

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use citelink_linker::db::SqliteResultCache;
use citelink_linker::services::normalizer::key_for;
use citelink_linker::services::resolver::http::{HttpFetch, HttpResponse, SourceError};
use citelink_linker::services::{CitationResolver, Resolver, ResolverSettings, ResultCache};

const CITATION: &str = "Smith, John (2020). The Theory of Everything. Journal of Things 12(3), pp. 1-25.";
const CROSSREF: &str = "https://api.crossref.org/works";
const UNPAYWALL: &str = "https://api.unpaywall.org/v2/";
const S2_DOI: &str = "https://api.semanticscholar.org/graph/v1/paper/DOI:10.1000/xyz";

/// Canned responses matched by URL prefix; anything else is a network error
#[derive(Default)]
struct CannedFetcher {
    routes: Vec<(String, u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl CannedFetcher {
    fn route(mut self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes.push((prefix.to_string(), status, body.to_string()));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetch for CannedFetcher {
    async fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, SourceError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(prefix, _, _)| url.starts_with(prefix.as_str()))
            .map(|(_, status, body)| HttpResponse::new(*status, body.clone()))
            .ok_or_else(|| SourceError::Network(format!("unreachable: {}", url)))
    }

    async fn head(&self, url: &str) -> Result<u16, SourceError> {
        self.calls.lock().unwrap().push(format!("HEAD {}", url));
        Ok(404)
    }
}

async fn sqlite_cache(dir: &TempDir) -> Arc<SqliteResultCache> {
    let pool = citelink_common::db::init_database(&dir.path().join("citelink.db"))
        .await
        .unwrap();
    Arc::new(SqliteResultCache::new(pool))
}

fn settings(contact_email: Option<&str>) -> ResolverSettings {
    ResolverSettings {
        contact_email: contact_email.map(String::from),
        source_spacing: Duration::ZERO,
        ..ResolverSettings::default()
    }
}

fn crossref_hit() -> &'static str {
    r#"{"message": {"items": [{"DOI": "10.1000/xyz"}]}}"#
}

#[tokio::test]
async fn test_unpaywall_skipped_without_contact_email() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        CannedFetcher::default()
            .route(CROSSREF, 200, crossref_hit())
            .route(
                S2_DOI,
                200,
                r#"{"isOpenAccess": true, "openAccessPdf": {"url": "https://example.org/paper.pdf"}}"#,
            ),
    );
    let resolver = Resolver::standard(fetcher.clone(), sqlite_cache(&dir).await, &settings(None));

    let resolved = resolver.resolve(CITATION).await;

    assert!(resolved.result.success);
    assert_eq!(resolved.result.url.as_deref(), Some("https://example.org/paper.pdf"));
    assert_eq!(resolved.result.source_name.as_deref(), Some("semantic_scholar"));
    assert_eq!(resolved.result.attempted_sources, vec!["semantic_scholar"]);
    assert!(!fetcher.calls().iter().any(|url| url.starts_with(UNPAYWALL)));
}

#[tokio::test]
async fn test_unpaywall_first_with_contact_email() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        CannedFetcher::default()
            .route(CROSSREF, 200, crossref_hit())
            .route(
                UNPAYWALL,
                200,
                r#"{"is_oa": true, "best_oa_location": {"url_for_pdf": "https://repo.example.edu/smith.pdf"}}"#,
            ),
    );
    let resolver = Resolver::standard(
        fetcher.clone(),
        sqlite_cache(&dir).await,
        &settings(Some("librarian@example.edu")),
    );

    let resolved = resolver.resolve(CITATION).await;

    assert_eq!(resolved.result.source_name.as_deref(), Some("unpaywall"));
    assert_eq!(resolved.result.attempted_sources, vec!["unpaywall"]);
    // Identifier lookup then one link source
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn test_negative_result_is_cached() {
    let dir = TempDir::new().unwrap();
    let cache = sqlite_cache(&dir).await;
    let fetcher = Arc::new(
        CannedFetcher::default().route(CROSSREF, 200, r#"{"message": {"items": []}}"#),
    );
    let resolver = Resolver::standard(fetcher.clone(), cache.clone(), &settings(None));

    let first = resolver.resolve(CITATION).await;
    assert!(!first.from_cache);
    assert!(!first.result.success);
    assert_eq!(
        first.result.attempted_sources,
        vec!["open_library", "semantic_scholar", "core"]
    );

    let calls_after_first = fetcher.calls().len();
    let second = resolver.resolve(CITATION).await;

    assert!(second.from_cache);
    assert_eq!(second.result, first.result);
    assert_eq!(fetcher.calls().len(), calls_after_first);

    let entry = cache.get(&key_for(CITATION)).await.unwrap().unwrap();
    assert!(entry.is_negative());
}

#[tokio::test]
async fn test_cache_shared_across_resolvers() {
    let dir = TempDir::new().unwrap();
    let cache = sqlite_cache(&dir).await;
    let fetcher = Arc::new(
        CannedFetcher::default()
            .route(CROSSREF, 200, crossref_hit())
            .route(
                S2_DOI,
                200,
                r#"{"isOpenAccess": true, "openAccessPdf": {"url": "https://example.org/paper.pdf"}}"#,
            ),
    );

    let first = Resolver::standard(fetcher.clone(), cache.clone(), &settings(None));
    first.resolve(CITATION).await;
    let calls = fetcher.calls().len();

    // Same text after normalization hits the entry written by another resolver
    let second = Resolver::standard(fetcher.clone(), cache, &settings(None));
    let resolved = second.resolve(&CITATION.to_uppercase()).await;

    assert!(resolved.from_cache);
    assert_eq!(resolved.result.url.as_deref(), Some("https://example.org/paper.pdf"));
    assert_eq!(fetcher.calls().len(), calls);
}
