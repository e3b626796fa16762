//! Document items

use serde::{Deserialize, Serialize};

use crate::services::normalizer;

/// One ordered text unit read from a document
///
/// Items are immutable once read; the engine never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable 0-based position in the document
    pub index: usize,
    /// 0-based source line the item starts on
    #[serde(default)]
    pub line: usize,
    /// Text as read from the document
    pub raw_text: String,
    /// Key of the PDF-repaired text; the resolver caches under it
    pub normalized_hash: String,
}

impl Item {
    /// Item whose source line equals its index
    pub fn new(index: usize, raw_text: impl Into<String>) -> Self {
        Self::at_line(index, index, raw_text)
    }

    pub fn at_line(index: usize, line: usize, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let normalized_hash = normalizer::key_for(&normalizer::repair_pdf_text(&raw_text));
        Self {
            index,
            line,
            raw_text,
            normalized_hash,
        }
    }

    /// Build items from a sequence of texts, indexed by position
    pub fn from_texts<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Self::new(index, text))
            .collect()
    }
}
