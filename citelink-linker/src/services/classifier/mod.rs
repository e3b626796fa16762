//! Paragraph classifier
//!
//! Decides whether a paragraph is a READING to resolve or something else.
//! Evaluation order is fixed: length gate, header veto, instruction scoring,
//! reading scoring. Only the header veto short-circuits; within a family
//! every rule is evaluated and its reason recorded in table order.

pub mod header;
pub mod rules;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::classification::CLASSIFICATION_THRESHOLD;
use crate::models::{Classification, ItemKind};
use rules::Rule;

/// Trimmed texts shorter than this are not scored
pub const MIN_TEXT_CHARS: usize = 15;

/// Lowest reading score that lands in the manual review queue
pub const UNCERTAIN_MIN_SCORE: i32 = 1;

static LEADING_BULLETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d.)\-•*]+\s*").expect("valid bullet pattern"));

/// Classify one paragraph
pub fn classify(text: &str) -> Classification {
    let text = text.trim();
    if text.chars().count() < MIN_TEXT_CHARS {
        return Classification::too_short();
    }

    if let Some(found) = header::detect_header(text) {
        return Classification::header(found.reason, found.section_marker);
    }

    let cleaned = strip_leading_bullets(text);

    let (score, reasons) = instruction_score(cleaned);
    if score >= CLASSIFICATION_THRESHOLD {
        return Classification::scored(ItemKind::Instruction, score, reasons);
    }

    let (score, reasons) = reading_score(cleaned);
    let kind = if score >= CLASSIFICATION_THRESHOLD {
        ItemKind::Reading
    } else if score >= UNCERTAIN_MIN_SCORE {
        ItemKind::Uncertain
    } else {
        ItemKind::Other
    };

    Classification::scored(kind, score, reasons)
}

/// Instruction score of bullet-stripped text with contributing reasons
pub fn instruction_score(text: &str) -> (i32, Vec<String>) {
    let mut score = 0;
    let mut reasons = Vec::new();
    apply_rules(&rules::INSTRUCTION_RULES, text, &mut score, &mut reasons);
    (score, reasons)
}

/// Reading score of bullet-stripped text with contributing reasons
pub fn reading_score(text: &str) -> (i32, Vec<String>) {
    let mut score = 0;
    let mut reasons = Vec::new();

    apply_rules(&rules::READING_RULES, text, &mut score, &mut reasons);

    if rules::looks_like_author(text) {
        score += rules::AUTHOR_START_BONUS;
        reasons.push(format!("{:+} Starts with author name", rules::AUTHOR_START_BONUS));
    }

    if text.chars().count() > rules::LENGTH_BONUS_CHARS {
        score += rules::LENGTH_BONUS;
        reasons.push(format!("{:+} Substantial length", rules::LENGTH_BONUS));
    }

    apply_rules(&rules::READING_NEGATIVE_RULES, text, &mut score, &mut reasons);

    (score, reasons)
}

fn apply_rules(table: &[Rule], text: &str, score: &mut i32, reasons: &mut Vec<String>) {
    for rule in table {
        if rule.pattern.is_match(text) {
            *score += rule.weight;
            reasons.push(rule.reason());
        }
    }
}

pub(crate) fn strip_leading_bullets(text: &str) -> &str {
    match LEADING_BULLETS.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classification::HEADER_CONFIDENCE;

    const SMITH: &str = "Smith, John (2020). The Theory of Everything. New York: Oxford University Press, pp. 1-25.";

    #[test]
    fn test_full_citation_is_reading() {
        let result = classify(SMITH);
        assert_eq!(result.kind, ItemKind::Reading);
        assert!(result.score >= 6);
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert!(result.reasons.contains(&"+3 Last, First (Year)".to_string()));
        assert!(result.reasons.contains(&"+1 University Press".to_string()));
        assert!(result.reasons.contains(&"+1 Page numbers".to_string()));
        assert!(result.reasons.contains(&"+2 Starts with author name".to_string()));
    }

    #[test]
    fn test_citation_has_negative_instruction_score() {
        let (score, reasons) = instruction_score(SMITH);
        assert!(score < 0);
        assert!(reasons.contains(&"-2 Publisher name".to_string()));
    }

    #[test]
    fn test_office_hours_is_instruction() {
        let result = classify("Office hours: Mondays 2-4pm, Room 305");
        assert_eq!(result.kind, ItemKind::Instruction);
        assert_eq!(
            result.reasons,
            vec!["+2 Office hours", "+2 Day + time", "+1 Location/time info"]
        );
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_week_header() {
        let result = classify("Week 3: Inequality");
        assert_eq!(result.kind, ItemKind::Header);
        assert!((result.confidence - HEADER_CONFIDENCE).abs() < 1e-9);
        assert_eq!(result.section_marker.as_deref(), Some("Week 3"));
    }

    #[test]
    fn test_header_wins_over_strong_citation() {
        let result = classify(&format!("Week 3: {}", SMITH));
        assert_eq!(result.kind, ItemKind::Header);
        assert_eq!(result.reasons, vec!["Week header"]);
        assert_eq!(result.score, 0);
        assert_eq!(result.section_marker.as_deref(), Some("Week 3"));
    }

    #[test]
    fn test_header_wins_over_strong_instruction() {
        let text = "Session 4: Read chapters 1-3 and submit on Canvas";
        let result = classify(text);
        assert_eq!(result.kind, ItemKind::Header);
        assert_eq!(result.reasons, vec!["Session header"]);
        assert_eq!(result.section_marker.as_deref(), Some("Session 4"));

        // Without the heading the same text is an instruction
        let body = classify("Read chapters 1-3 and submit on Canvas");
        assert_eq!(body.kind, ItemKind::Instruction);
    }

    #[test]
    fn test_reading_at_exact_threshold() {
        let result = classify("Harvey, David. The condition of postmodernity, 1989.");
        assert_eq!(result.kind, ItemKind::Reading);
        assert_eq!(result.score, CLASSIFICATION_THRESHOLD);
        assert_eq!(
            result.reasons,
            vec!["+1 Year after comma", "+2 Starts with author name"]
        );
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_short_text_is_not_scored() {
        let result = classify("   Smith 2020   ");
        assert_eq!(result.kind, ItemKind::TooShort);
        assert!(result.reasons.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_imperative_instruction() {
        let result = classify("Read chapters one and two before class on Tuesday");
        assert_eq!(result.kind, ItemKind::Instruction);
        assert!(result.reasons.contains(&"+3 Imperative verb start".to_string()));
    }

    #[test]
    fn test_borderline_is_uncertain() {
        // Author-shaped opener with no other bibliographic signal
        let result = classify("Harvey on the condition of postmodernity");
        assert_eq!(result.kind, ItemKind::Uncertain);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_prose_is_other() {
        let result = classify("the remaining discussion will happen online");
        assert_eq!(result.kind, ItemKind::Other);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(classify(SMITH), classify(SMITH));
    }

    #[test]
    fn test_bullets_are_stripped() {
        assert_eq!(strip_leading_bullets("1.) Smith"), "Smith");
        assert_eq!(strip_leading_bullets("• Smith"), "Smith");
        assert_eq!(strip_leading_bullets("Smith"), "Smith");
    }
}
