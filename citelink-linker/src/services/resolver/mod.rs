//! Resolver waterfall
//!
//! Turns citation text into a document link by trying link sources in a
//! fixed order and stopping at the first hit:
//!
//! 1. Result cache (unexpired entries returned verbatim)
//! 2. Identifier lookup (Crossref DOI)
//! 3. With a DOI: academic chain (Unpaywall, Semantic Scholar, CORE)
//! 4. Without a DOI, or academic chain exhausted: book chain
//!    (Open Library, Semantic Scholar, CORE; title search only)
//!
//! Source failures never abort a resolution. Exhausting every applicable
//! source yields a negative result, which is cached like a positive one.
//! Concurrent resolutions of the same text share one fetch sequence.

pub mod http;
pub mod query;
pub mod sources;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::ResolutionResult;
use crate::services::cache::{ResultCache, DEFAULT_CACHE_TTL};
use crate::services::normalizer::key_for;
use http::HttpFetch;
use query::CitationQuery;
use sources::{
    CoreSource, CrossrefLookup, IdentifierLookup, LinkSource, OpenLibrarySource,
    SemanticScholarSource, UnpaywallSource,
};

/// Resolution outcome and whether it came from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub result: ResolutionResult,
    pub from_cache: bool,
}

/// Resolves citation text to a link
#[async_trait]
pub trait CitationResolver: Send + Sync {
    /// Resolve under a precomputed cache key, such as `Item::normalized_hash`
    async fn resolve_keyed(&self, key: &str, citation_text: &str) -> Resolved;

    async fn resolve(&self, citation_text: &str) -> Resolved {
        self.resolve_keyed(&key_for(citation_text), citation_text).await
    }
}

/// Settings for the standard source line-up
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Required by Unpaywall, courtesy for Crossref
    pub contact_email: Option<String>,
    pub core_api_key: Option<String>,
    /// Minimum spacing between calls to the same source
    pub source_spacing: Duration,
    pub cache_ttl: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            contact_email: None,
            core_api_key: None,
            source_spacing: Duration::from_secs(1),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Cached, single-flight source waterfall
pub struct Resolver {
    cache: Arc<dyn ResultCache>,
    cache_ttl: Duration,
    identifier: Option<Arc<dyn IdentifierLookup>>,
    academic: Vec<Arc<dyn LinkSource>>,
    books: Vec<Arc<dyn LinkSource>>,
    in_flight: Mutex<HashMap<String, KeyLock>>,
}

impl Resolver {
    /// Resolver with no sources; every miss resolves negative
    pub fn new(cache: Arc<dyn ResultCache>, cache_ttl: Duration) -> Self {
        Self {
            cache,
            cache_ttl,
            identifier: None,
            academic: Vec::new(),
            books: Vec::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Crossref, Unpaywall, Semantic Scholar, CORE and Open Library
    pub fn standard(
        fetcher: Arc<dyn HttpFetch>,
        cache: Arc<dyn ResultCache>,
        settings: &ResolverSettings,
    ) -> Self {
        let spacing = settings.source_spacing;

        let crossref = Arc::new(CrossrefLookup::new(
            fetcher.clone(),
            spacing,
            settings.contact_email.clone(),
        ));
        let unpaywall: Arc<dyn LinkSource> = Arc::new(UnpaywallSource::new(
            fetcher.clone(),
            spacing,
            settings.contact_email.clone(),
        ));
        let semantic_scholar: Arc<dyn LinkSource> =
            Arc::new(SemanticScholarSource::new(fetcher.clone(), spacing));
        let core: Arc<dyn LinkSource> = Arc::new(CoreSource::new(
            fetcher.clone(),
            spacing,
            settings.core_api_key.clone(),
        ));
        let open_library: Arc<dyn LinkSource> = Arc::new(OpenLibrarySource::new(fetcher, spacing));

        if settings.contact_email.is_none() {
            info!("No contact email configured; Unpaywall will be skipped");
        }

        Self::new(cache, settings.cache_ttl)
            .with_identifier_lookup(crossref)
            .with_academic_source(unpaywall)
            .with_academic_source(semantic_scholar.clone())
            .with_academic_source(core.clone())
            .with_book_source(open_library)
            .with_book_source(semantic_scholar)
            .with_book_source(core)
    }

    pub fn with_identifier_lookup(mut self, lookup: Arc<dyn IdentifierLookup>) -> Self {
        self.identifier = Some(lookup);
        self
    }

    pub fn with_academic_source(mut self, source: Arc<dyn LinkSource>) -> Self {
        self.academic.push(source);
        self
    }

    pub fn with_book_source(mut self, source: Arc<dyn LinkSource>) -> Self {
        self.books.push(source);
        self
    }

    async fn cached(&self, key: &str) -> Option<ResolutionResult> {
        match self.cache.get(key).await {
            Ok(entry) => entry.map(|e| e.result),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed; treating as miss");
                None
            }
        }
    }

    fn key_lock(&self, key: &str) -> KeyLock {
        let mut locks = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    fn release_key_lock(&self, key: &str, lock: KeyLock) {
        let mut locks = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // Map entry plus ours: nobody else is waiting
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    async fn run_waterfall(&self, citation_text: &str) -> ResolutionResult {
        let mut query = CitationQuery::new(citation_text);
        let mut attempted = Vec::new();

        if let Some(lookup) = &self.identifier {
            if !query.cleaned.is_empty() {
                match lookup.find_identifier(&query.cleaned).await {
                    Ok(Some(doi)) => query = query.with_doi(doi),
                    Ok(None) => debug!(source = lookup.name(), "No identifier found"),
                    Err(e) => warn!(source = lookup.name(), error = %e, "Identifier lookup failed"),
                }
            }
        }

        if query.doi.is_some() {
            if let Some(found) = try_chain(&self.academic, &query, &mut attempted).await {
                return found;
            }
        }

        let title_only = query.without_doi();
        if let Some(found) = try_chain(&self.books, &title_only, &mut attempted).await {
            return found;
        }

        ResolutionResult::not_found(attempted)
    }
}

async fn try_chain(
    chain: &[Arc<dyn LinkSource>],
    query: &CitationQuery,
    attempted: &mut Vec<String>,
) -> Option<ResolutionResult> {
    for source in chain {
        if !source.is_available() {
            debug!(source = source.name(), "Skipping source: precondition not met");
            continue;
        }

        attempted.push(source.name().to_string());

        match source.find_link(query).await {
            Ok(Some(url)) => {
                info!(source = source.name(), url = %url, "Link found");
                return Some(ResolutionResult::found(
                    source.name(),
                    url,
                    attempted.clone(),
                ));
            }
            Ok(None) => debug!(source = source.name(), "No link"),
            Err(e) => warn!(source = source.name(), error = %e, "Link source failed"),
        }
    }

    None
}

#[async_trait]
impl CitationResolver for Resolver {
    async fn resolve_keyed(&self, key: &str, citation_text: &str) -> Resolved {
        if let Some(result) = self.cached(key).await {
            debug!(key = %key, success = result.success, "Cache hit");
            return Resolved {
                result,
                from_cache: true,
            };
        }

        let lock = self.key_lock(key);
        let guard = lock.lock().await;

        // A concurrent caller may have finished while we waited
        let resolved = match self.cached(key).await {
            Some(result) => Resolved {
                result,
                from_cache: true,
            },
            None => {
                let result = self.run_waterfall(citation_text).await;
                if let Err(e) = self.cache.put(key, &result, self.cache_ttl).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
                Resolved {
                    result,
                    from_cache: false,
                }
            }
        };

        drop(guard);
        self.release_key_lock(key, lock);

        resolved
    }
}
