//! Links found without asking the resolver
//!
//! A citation that already carries a URL links to it directly. A citation
//! matching a document the user already holds links to that copy.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::services::normalizer::normalize;

static HTTP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"')\]]+[^\s<>"')\].,;:!?]"#).expect("valid url pattern")
});
static WWW_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"www\.[^\s<>"')\]]+[^\s<>"')\].,;:!?]"#).expect("valid www pattern")
});

/// First web address in the text, without trailing punctuation
///
/// Bare `www.` addresses are returned with an `https://` scheme.
pub fn extract_url(text: &str) -> Option<String> {
    if let Some(m) = HTTP_URL.find(text) {
        return Some(m.as_str().to_string());
    }
    WWW_URL
        .find(text)
        .map(|m| format!("https://{}", m.as_str()))
}

/// Words ignored when comparing citations with file names
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "for", "to", "with", "by", "from", "pp",
    "vol", "chapter", "ed", "eds",
];

/// Lowest score accepted as a match
pub const MATCH_THRESHOLD: f64 = 0.4;
/// Bonus when the file name's first word (usually the author) appears
pub const AUTHOR_BONUS: f64 = 0.3;
/// First words this short are too common to earn the bonus
const MIN_AUTHOR_WORD_CHARS: usize = 3;

/// Library scan errors
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Library path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A document the user already holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// File name, used for matching
    pub name: String,
    /// Where the document lives
    pub link: String,
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: LibraryEntry,
    normalized: String,
    keywords: HashSet<String>,
}

/// Keyword index over existing documents
#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    entries: Vec<IndexedEntry>,
}

impl LibraryIndex {
    pub fn new(entries: impl IntoIterator<Item = LibraryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let normalized = normalize(strip_pdf_extension(&entry.name));
                let keywords = keywords(&normalized);
                IndexedEntry {
                    entry,
                    normalized,
                    keywords,
                }
            })
            .collect();

        Self { entries }
    }

    /// Index every PDF below `root`, linked by `file://` URL
    pub fn from_directory(root: &Path) -> Result<Self, LibraryError> {
        if !root.exists() {
            return Err(LibraryError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(LibraryError::NotADirectory(root.to_path_buf()));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable library entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.to_lowercase().ends_with(".pdf") {
                continue;
            }

            let path = entry.path().canonicalize().unwrap_or_else(|_| entry.path().to_path_buf());
            entries.push(LibraryEntry {
                name,
                link: format!("file://{}", path.display()),
            });
        }

        tracing::info!(root = %root.display(), documents = entries.len(), "Library indexed");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-scoring document for a citation, if any clears the threshold
    ///
    /// Score is the share of the file name's keywords found in the citation,
    /// plus a bonus when the name's first word appears in it. Ties keep the
    /// earlier entry.
    pub fn best_match(&self, citation: &str) -> Option<&LibraryEntry> {
        let citation_norm = normalize(citation);
        let citation_words = keywords(&citation_norm);

        let mut best: Option<(&IndexedEntry, f64)> = None;
        for indexed in &self.entries {
            if indexed.keywords.is_empty() {
                continue;
            }

            let common = indexed.keywords.intersection(&citation_words).count();
            if common == 0 {
                continue;
            }

            let mut score = common as f64 / indexed.keywords.len() as f64;
            if let Some(first) = indexed.normalized.split(' ').next() {
                if first.chars().count() >= MIN_AUTHOR_WORD_CHARS && citation_norm.contains(first) {
                    score += AUTHOR_BONUS;
                }
            }

            let better = best.map_or(true, |(_, best_score)| score > best_score);
            if score >= MATCH_THRESHOLD && better {
                best = Some((indexed, score));
            }
        }

        best.map(|(indexed, _)| &indexed.entry)
    }
}

fn strip_pdf_extension(name: &str) -> &str {
    name.strip_suffix(".pdf")
        .or_else(|| name.strip_suffix(".PDF"))
        .unwrap_or(name)
}

fn keywords(normalized: &str) -> HashSet<String> {
    normalized
        .split(' ')
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}
