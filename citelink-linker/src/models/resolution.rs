//! Resolution outcomes and cache entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of resolving one citation
///
/// `source_name` and `url` are present iff `success`. A result with
/// `success == false` is a definitive negative: every applicable adapter was
/// tried and none produced a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub source_name: Option<String>,
    pub url: Option<String>,
    pub success: bool,
    /// Adapters actually invoked, in order
    pub attempted_sources: Vec<String>,
}

impl ResolutionResult {
    pub fn found(
        source_name: impl Into<String>,
        url: impl Into<String>,
        attempted_sources: Vec<String>,
    ) -> Self {
        Self {
            source_name: Some(source_name.into()),
            url: Some(url.into()),
            success: true,
            attempted_sources,
        }
    }

    pub fn not_found(attempted_sources: Vec<String>) -> Self {
        Self {
            source_name: None,
            url: None,
            success: false,
            attempted_sources,
        }
    }
}

/// Cached resolution keyed by normalized-text hash
///
/// Absence of an entry means "never tried"; an entry holding a negative
/// result means "tried and not found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub result: ResolutionResult,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_negative(&self) -> bool {
        !self.result.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_found_carries_url_and_source() {
        let result = ResolutionResult::found("core", "https://x/a.pdf", vec!["core".into()]);
        assert!(result.success);
        assert_eq!(result.url.as_deref(), Some("https://x/a.pdf"));
        assert_eq!(result.source_name.as_deref(), Some("core"));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry {
            key: "k".into(),
            result: ResolutionResult::not_found(vec![]),
            created_at: now,
            expires_at: now + Duration::hours(6),
        };
        assert!(entry.is_negative());
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + Duration::hours(6)));
    }
}
