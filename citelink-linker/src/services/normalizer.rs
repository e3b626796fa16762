//! Text normalization and content hashing
//!
//! `normalize` and `hash_key` are total, side-effect free and stable across
//! processes, so hashes can key the shared result cache.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static HYPHENATED_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)-\s+(\w)").expect("valid hyphenation pattern"));

/// Lowercase, replace punctuation with spaces, collapse whitespace
pub fn normalize(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    collapse_whitespace(&replaced)
}

/// Hex SHA-256 digest of already-normalized text
pub fn hash_key(normalized: &str) -> String {
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// Cache/dedup key for raw text
pub fn key_for(text: &str) -> String {
    hash_key(&normalize(text))
}

/// Repair artifacts left by copying text out of PDFs
///
/// Smart quotes and dashes become ASCII, non-breaking spaces become spaces,
/// byte-order marks are dropped and words split across a line break by a
/// hyphen are rejoined.
pub fn repair_pdf_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .filter(|c| *c != '\u{feff}')
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{00a0}' => ' ',
            other => other,
        })
        .collect();

    let joined = HYPHENATED_BREAK.replace_all(&replaced, "$1$2");
    collapse_whitespace(&joined)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
