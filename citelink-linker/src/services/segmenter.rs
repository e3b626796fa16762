//! Plain-text segmentation
//!
//! Text copied out of PDFs rarely has one citation per line. Wrapped
//! citations arrive as several fragments and consecutive citations are
//! sometimes run together on one line. `merge_fragmented_lines` rejoins the
//! former and `split_concatenated_readings` separates the latter; both work
//! on ordered regex rules only.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::classifier::rules::looks_like_author;
use crate::services::normalizer::repair_pdf_text;

/// Segments at or below this many characters never stand alone after a split
const MIN_SEGMENT_CHARS: usize = 25;
/// Lines shorter than this are returned unsplit
const MIN_SPLIT_CHARS: usize = 40;

/// Trailing words that leave a citation unfinished
const INCOMPLETE_ENDINGS: &[&str] = &[
    " in", " in:", " the", " a", " an", " and", " or", " of", " for", " to", " by", " from",
    " with", " on", " at", " as", ",", ":", ";", " vol", " vol.", " pp", " pp.", " ed", " ed.",
    " eds", " eds.", " trans", " trans.", " chapter", " ch", " ch.", "&", " new", " york",
    " cambridge", " oxford", " london", " chicago",
];

/// Journal title words that open a wrapped citation tail
const JOURNAL_STARTS: &[&str] = &[
    "Journal", "Quarterly", "Review", "Studies", "Research", "Bulletin", "Proceedings",
    "American", "British", "International", "Annual", "European", "Canadian", "Australian",
    "African", "Asian", "Latin", "Social", "Cultural", "Political", "Economic", "Historical",
    "Inquiry", "Analysis", "Perspectives", "Theory", "Practice", "Signs", "Gender", "Feminist",
    "Women", "Men", "Sexuality",
];

/// Publisher and place names that open a wrapped citation tail
const PUBLISHER_STARTS: &[&str] = &[
    "Oxford", "Cambridge", "Routledge", "Sage", "Springer", "Wiley", "University", "Press",
    "Books", "Publishing", "Publishers", "Harper", "Random", "Penguin", "Basic", "Free", "Duke",
    "MIT", "Harvard", "Yale", "Princeton", "Stanford", "Chicago", "California", "New York",
    "London", "Boston", "Philadelphia",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("segmentation pattern must compile")
}

static PAREN_YEAR: Lazy<Regex> = Lazy::new(|| re(r"\(\d{4}\)"));
static HYPHEN_END: Lazy<Regex> = Lazy::new(|| re(r"[a-z]-$"));
static CAPITALIZED_END: Lazy<Regex> = Lazy::new(|| re(r"\s[A-Z][a-z]+$"));
static SENTENCE_THEN_CAPITALIZED_END: Lazy<Regex> = Lazy::new(|| re(r"\.\s*[A-Z][a-z]+$"));
static TERMINAL_END: Lazy<Regex> = Lazy::new(|| re(r"[.!?)\]\d]$"));
static ANY_QUOTE: Lazy<Regex> = Lazy::new(|| re("[\"\u{201c}\u{201d}]"));

static VOLUME_START: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)^(Vol\.?|Volume|pp?\.?|Issue|No\.?|Chapter|Ch\.?)\s*\d"));
static NUMBER_START: Lazy<Regex> = Lazy::new(|| re(r"^\d+\s*[-–:()]"));
static ISSUE_START: Lazy<Regex> = Lazy::new(|| re(r"^\(\d+\)"));
static EDITOR_START: Lazy<Regex> = Lazy::new(|| re(r"(?i)^(ed\.|eds\.|trans\.|translated)"));
static CONNECTIVE_START: Lazy<Regex> = Lazy::new(|| re(r"(?i)^(and|or|in|of|for|the|a|an)\s"));
static NUMBERS_ONLY: Lazy<Regex> = Lazy::new(|| re(r"^[\d\s\-–:,().]+$"));
static PAGE_RANGE: Lazy<Regex> = Lazy::new(|| re(r"^\d+[-–]\d+\.?$"));
static AUTHOR_LEAD: Lazy<Regex> = Lazy::new(|| re(r"^[A-Z][a-z]+[,\s]+(?:[A-Z]|and|\(|\d{4})"));
static CAPITALIZED_START: Lazy<Regex> = Lazy::new(|| re(r"^[A-Z][a-z]+"));
static AUTHOR_YEAR_START: Lazy<Regex> = Lazy::new(|| re(r"^[A-Z][a-z]+\s*[(,]\s*\d{4}"));

static NEW_CITATION_START: Lazy<Regex> =
    Lazy::new(|| re(r"^[A-Z][a-z]+(?:,\s*[A-Z]\.?)?\s*\(\d{4}\)"));
static CAPITALIZED_WITH_YEAR: Lazy<Regex> = Lazy::new(|| re(r"^[A-Z][a-z]+.*\(\d{4}\)"));
static VOLUME_OR_DIGIT_START: Lazy<Regex> = Lazy::new(|| re(r"(?i)^(Vol|pp?|Issue|\d)"));
static SHORT_CITATION_TAIL: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)^[\w\s,]+,?\s*(Vol\.?|pp?\.?|Issue)?\s*\d"));

static AUTHOR_YEAR_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    re(r"(\.\s*|\)\s*\.?\s*)([A-Z][a-z]+(?:\s+(?:and|&)\s+[A-Z][a-z]+)?(?:\s+et\s+al\.?)?\s*[(,]\s*\d{4})")
});
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?:^|\s)(\d+[.)]\s*|[-•●○]\s*)[A-Z][a-z]"));
static AUTHOR_YEAR_PAIR: Lazy<Regex> = Lazy::new(|| {
    re(r"([A-Z][a-z]+(?:\s+(?:and|&)\s+[A-Z][a-z]+)?(?:\s+et\s+al\.?)?)\s*[(,]?\s*(\d{4})\)?")
});

/// Whether a line looks cut off in the middle of a citation
pub fn is_incomplete_line(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    let lower = text.to_lowercase();
    if INCOMPLETE_ENDINGS.iter().any(|ending| lower.ends_with(ending)) {
        return true;
    }

    if text.ends_with('"') || text.ends_with('\'') || text.ends_with('\u{201c}') {
        return true;
    }

    if HYPHEN_END.is_match(text) {
        return true;
    }

    // Mid-title or mid-journal name
    if CAPITALIZED_END.is_match(text) && !SENTENCE_THEN_CAPITALIZED_END.is_match(text) {
        return true;
    }

    !TERMINAL_END.is_match(text)
        && (looks_like_author(text) || PAREN_YEAR.is_match(text) || ANY_QUOTE.is_match(text))
}

/// Whether a line looks like the tail of the citation before it
pub fn is_continuation_line(text: &str) -> bool {
    let text = text.trim();
    let Some(first) = text.chars().next() else {
        return false;
    };

    if first.is_lowercase() {
        return true;
    }

    if VOLUME_START.is_match(text) || NUMBER_START.is_match(text) || ISSUE_START.is_match(text) {
        return true;
    }

    if JOURNAL_STARTS.iter().any(|word| text.starts_with(word))
        || PUBLISHER_STARTS.iter().any(|word| text.starts_with(word))
    {
        return true;
    }

    if matches!(first, '"' | '\'' | '\u{201d}' | ')') {
        return true;
    }

    if EDITOR_START.is_match(text) || CONNECTIVE_START.is_match(text) {
        return true;
    }

    if text.chars().count() < 40 && (NUMBERS_ONLY.is_match(text) || PAGE_RANGE.is_match(text)) {
        return true;
    }

    // Capitalized but not shaped like "Surname, X" or "Surname (Year)"
    !AUTHOR_LEAD.is_match(text)
        && CAPITALIZED_START.is_match(text)
        && !AUTHOR_YEAR_START.is_match(text)
}

/// Whether `next` continues the citation accumulated in `prev`
pub fn should_merge_lines(prev: &str, next: &str) -> bool {
    if NEW_CITATION_START.is_match(next) {
        return false;
    }

    let head: String = next.chars().take(50).collect();
    if looks_like_author(next) && PAREN_YEAR.is_match(&head) {
        return false;
    }

    let ends_terminal = prev
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | ')' | ']' | '"' | '\u{201d}'));
    if ends_terminal && CAPITALIZED_WITH_YEAR.is_match(next) {
        return false;
    }

    if !is_incomplete_line(prev) {
        return false;
    }

    is_continuation_line(next)
        || VOLUME_OR_DIGIT_START.is_match(next)
        || (next.chars().count() < 50 && SHORT_CITATION_TAIL.is_match(next))
}

/// Join wrapped lines
///
/// Takes `(line_number, text)` pairs in order and returns merged texts
/// tagged with the line each one starts on. Blank lines end the current
/// segment and are dropped.
pub fn merge_fragmented_lines<'a, I>(lines: I) -> Vec<(usize, String)>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut merged = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (line, text) in lines {
        let text = text.trim();
        if text.is_empty() {
            merged.extend(current.take());
            continue;
        }

        match current.as_mut() {
            Some((_, accumulated)) if should_merge_lines(accumulated, text) => {
                accumulated.push(' ');
                accumulated.push_str(text);
                tracing::debug!(line, "Merged wrapped line");
            }
            _ => {
                merged.extend(current.take());
                current = Some((line, text.to_string()));
            }
        }
    }

    merged.extend(current);
    merged
}

/// Split a line holding several citations
///
/// Tries, in order: author-year boundaries after a sentence end, numbered or
/// bulleted list markers, semicolons, then any run of author-year pairs. The
/// first strategy producing more than one segment wins. Segments are
/// returned PDF-repaired; unsplit text comes back trimmed but otherwise as
/// given.
pub fn split_concatenated_readings(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let repaired = repair_pdf_text(trimmed);
    if repaired.chars().count() < MIN_SPLIT_CHARS {
        return vec![trimmed.to_string()];
    }

    let strategies: [fn(&str) -> Vec<String>; 4] = [
        split_on_author_year_boundaries,
        split_on_list_markers,
        split_on_semicolons,
        split_between_author_year_pairs,
    ];

    for strategy in strategies {
        let segments = strategy(&repaired);
        if segments.len() > 1 {
            return segments;
        }
    }

    vec![trimmed.to_string()]
}

/// Cut `text` at byte offsets and regroup short pieces with their neighbors
fn cut_at(text: &str, cuts: &[usize]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for &cut in cuts.iter().chain(std::iter::once(&text.len())) {
        if cut > start {
            pieces.push(text[start..cut].trim());
            start = cut;
        }
    }
    regroup(pieces.into_iter(), " ")
}

/// Keep pieces longer than `MIN_SEGMENT_CHARS`; shorter ones join the
/// segment before them, or the one after when they come first
fn regroup<'a>(pieces: impl Iterator<Item = &'a str>, joiner: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut leading = String::new();

    for piece in pieces.filter(|p| !p.is_empty()) {
        if piece.chars().count() > MIN_SEGMENT_CHARS {
            let mut segment = std::mem::take(&mut leading);
            if !segment.is_empty() {
                segment.push_str(joiner);
            }
            segment.push_str(piece);
            segments.push(segment);
        } else if let Some(last) = segments.last_mut() {
            last.push_str(joiner);
            last.push_str(piece);
        } else {
            if !leading.is_empty() {
                leading.push_str(joiner);
            }
            leading.push_str(piece);
        }
    }

    if !leading.is_empty() {
        segments.push(leading);
    }
    segments
}

/// "...(2020). Jones (2019) ..." splits before "Jones"
fn split_on_author_year_boundaries(text: &str) -> Vec<String> {
    let cuts: Vec<usize> = AUTHOR_YEAR_BOUNDARY
        .captures_iter(text)
        .filter_map(|caps| caps.get(2).map(|m| m.start()))
        .collect();
    cut_at(text, &cuts)
}

/// "1. Smith ... 2. Jones ..." splits at each marker, dropping the marker
fn split_on_list_markers(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for caps in LIST_MARKER.captures_iter(text) {
        let Some(marker) = caps.get(1) else { continue };
        pieces.push(text[start..marker.start()].trim());
        start = marker.end();
    }
    pieces.push(text[start..].trim());
    regroup(pieces.into_iter(), " ")
}

/// Semicolon-separated citations; a part that does not open like a citation
/// stays with the one before it
fn split_on_semicolons(text: &str) -> Vec<String> {
    if !text.contains(';') {
        return Vec::new();
    }

    let mut segments: Vec<String> = Vec::new();
    for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let starts_citation = looks_like_author(part) || PAREN_YEAR.is_match(part);
        let long_enough = part.chars().count() > MIN_SEGMENT_CHARS;

        match segments.last_mut() {
            Some(last) if !(starts_citation && long_enough) => {
                last.push_str("; ");
                last.push_str(part);
            }
            _ => segments.push(part.to_string()),
        }
    }
    segments
}

/// Split between consecutive author-year pairs at the nearest sentence end
fn split_between_author_year_pairs(text: &str) -> Vec<String> {
    let starts: Vec<usize> = AUTHOR_YEAR_PAIR.find_iter(text).map(|m| m.start()).collect();
    if starts.len() < 2 {
        return Vec::new();
    }

    let bytes = text.as_bytes();
    let mut cuts = Vec::new();
    let mut last_end = 0;

    for &start in &starts[1..] {
        let split = split_point_before(bytes, start, last_end);
        if let Some(point) = split.filter(|p| *p > last_end) {
            cuts.push(point);
            last_end = point;
        }
    }

    cut_at(text, &cuts)
}

/// Closest `.`/`;` followed by a space within 20 bytes before `start`,
/// else closest `)` followed by a space within 10 bytes
fn split_point_before(bytes: &[u8], start: usize, floor: usize) -> Option<usize> {
    let followed_by_space = |j: usize| j + 1 >= bytes.len() || bytes[j + 1] == b' ';

    let lower = start.saturating_sub(20).max(floor);
    if let Some(j) = (lower + 1..start)
        .rev()
        .find(|&j| matches!(bytes[j], b'.' | b';') && followed_by_space(j))
    {
        return Some(j + 1);
    }

    let lower = start.saturating_sub(10).max(floor);
    (lower + 1..start)
        .rev()
        .find(|&j| bytes[j] == b')' && j + 1 < bytes.len() && bytes[j + 1] == b' ')
        .map(|j| j + 1)
}
