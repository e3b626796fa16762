//! Paragraph classification results

use serde::{Deserialize, Serialize};

/// Confidence reported for structural header matches
pub const HEADER_CONFIDENCE: f64 = 0.95;

/// Upper bound for score-derived confidence
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Score at which READING and INSTRUCTION classifications begin
pub const CLASSIFICATION_THRESHOLD: i32 = 3;

/// Kind assigned to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// Academic reading to be resolved
    Reading,
    /// Structural heading (week, section, course title)
    Header,
    /// Administrative or directive text
    Instruction,
    /// Borderline reading score, deferred to manual review
    Uncertain,
    /// Below the minimum length, not scored
    TooShort,
    /// Anything else
    Other,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Reading => "READING",
            ItemKind::Header => "HEADER",
            ItemKind::Instruction => "INSTRUCTION",
            ItemKind::Uncertain => "UNCERTAIN",
            ItemKind::TooShort => "TOO_SHORT",
            ItemKind::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one item
///
/// Derived and never persisted. Identical text always yields an identical
/// value, including the order of `reasons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ItemKind,
    /// Signed score of the deciding rule family
    pub score: i32,
    /// 0.0 - 1.0, monotonic in score above the threshold
    pub confidence: f64,
    /// Labels of contributing rules, in evaluation order
    pub reasons: Vec<String>,
    /// Week/session marker carried by a header, e.g. "Week 3"
    pub section_marker: Option<String>,
}

impl Classification {
    pub fn too_short() -> Self {
        Self {
            kind: ItemKind::TooShort,
            score: 0,
            confidence: 0.0,
            reasons: Vec::new(),
            section_marker: None,
        }
    }

    pub fn header(reason: impl Into<String>, section_marker: Option<String>) -> Self {
        Self {
            kind: ItemKind::Header,
            score: 0,
            confidence: HEADER_CONFIDENCE,
            reasons: vec![reason.into()],
            section_marker,
        }
    }

    pub fn scored(kind: ItemKind, score: i32, reasons: Vec<String>) -> Self {
        let confidence = match kind {
            ItemKind::Reading | ItemKind::Instruction => confidence_for_score(score),
            _ => 0.0,
        };
        Self {
            kind,
            score,
            confidence,
            reasons,
            section_marker: None,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.kind == ItemKind::Reading
    }
}

/// Map a threshold-crossing score to a bounded confidence
///
/// `min(0.95, 0.6 + 0.05 * (score - 3))`
pub fn confidence_for_score(score: i32) -> f64 {
    let raw = 0.6 + 0.05 * f64::from(score - CLASSIFICATION_THRESHOLD);
    raw.min(MAX_CONFIDENCE)
}
