//! Search query preparation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::normalizer::collapse_whitespace;

/// Longest query sent to any search API
pub const MAX_QUERY_CHARS: usize = 150;

static PAGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pp\.?\s*\d+[-\u{2013}]?\d*").expect("valid page range pattern"));
static PAREN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\d{4}\)").expect("valid year pattern"));
static VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)vol\.\s*\d+").expect("valid volume pattern"));

/// Strip page ranges, parenthesized years and volume numbers
///
/// Search engines match titles and authors better without them.
pub fn clean_query(text: &str) -> String {
    let text = PAGE_RANGE.replace_all(text, "");
    let text = PAREN_YEAR.replace_all(&text, "");
    let text = VOLUME.replace_all(&text, "");
    collapse_whitespace(&text)
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect()
}

/// What a link source receives for one citation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationQuery {
    /// Citation as written
    pub text: String,
    /// Search-ready text
    pub cleaned: String,
    /// DOI found by the identifier lookup, if any
    pub doi: Option<String>,
}

impl CitationQuery {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cleaned: clean_query(text),
            doi: None,
        }
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    /// Same citation with the identifier dropped, for title-only searches
    pub fn without_doi(&self) -> Self {
        Self {
            doi: None,
            ..self.clone()
        }
    }
}
