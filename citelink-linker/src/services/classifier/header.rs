//! Structural header detection
//!
//! A header match vetoes all scoring. Headers that number a unit of the
//! course ("Week 3", "Session 12") also yield a section marker.

use once_cell::sync::Lazy;
use regex::Regex;

use super::strip_leading_bullets;

/// Header match with the rule that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub reason: &'static str,
    pub section_marker: Option<String>,
}

impl HeaderMatch {
    fn plain(reason: &'static str) -> Self {
        Self {
            reason,
            section_marker: None,
        }
    }
}

static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2,5}\s*\d{2,4}[:\s\-]").expect("valid course code pattern"));

static TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(spring|fall|summer|winter)\s+\d{4}\]|\((spring|fall|summer|winter)\s+\d{4}\)")
        .expect("valid term pattern")
});

static NUMBERED_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(week|session|class|module|unit|part|section|lecture|seminar|meeting|day)\s*(\d+)",
    )
    .expect("valid numbered unit pattern")
});

static MONTH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.?\s+\d{1,2}",
    )
    .expect("valid month date pattern")
});

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}(/\d{2,4})?$").expect("valid numeric date pattern"));

static DAY_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(monday|tuesday|wednesday|thursday|friday|saturday|sunday)")
        .expect("valid weekday pattern")
});

static ROMAN_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[IVX]+\.\s").expect("valid roman numeral pattern"));

/// Segment names that stand alone as headings
const HEADER_KEYWORDS: &[&str] = &[
    "introduction",
    "overview",
    "conclusion",
    "review",
    "midterm",
    "final",
    "exam",
    "break",
    "holiday",
    "no class",
    "thanksgiving",
    "spring break",
    "readings",
    "required readings",
    "recommended readings",
    "optional readings",
    "assignments",
    "topics",
    "schedule",
    "theme",
    "topic",
    "course policies",
    "policies",
    "grading",
    "grade breakdown",
    "office hours",
    "contact",
    "instructor",
    "professor",
    "teaching assistant",
    "course objectives",
    "learning objectives",
    "course description",
    "description",
    "prerequisites",
    "materials",
    "required materials",
    "textbooks",
    "books",
    "resources",
];

const MAX_ALL_CAPS_CHARS: usize = 60;
const MIN_ALL_CAPS_CHARS: usize = 4;
const MAX_COLON_HEADER_CHARS: usize = 40;

/// Detect a structural header in trimmed text
pub fn detect_header(text: &str) -> Option<HeaderMatch> {
    let lower = text.to_lowercase();
    let cleaned = strip_leading_bullets(&lower);

    if COURSE_CODE.is_match(text) {
        return Some(HeaderMatch::plain("Course code"));
    }

    if TERM.is_match(&lower) {
        return Some(HeaderMatch::plain("Term"));
    }

    if let Some(caps) = NUMBERED_UNIT.captures(cleaned) {
        let unit = &caps[1];
        let reason = if unit == "week" {
            "Week header"
        } else {
            "Session header"
        };
        return Some(HeaderMatch {
            reason,
            section_marker: Some(format!("{} {}", capitalize(unit), &caps[2])),
        });
    }

    if MONTH_DATE.is_match(cleaned) || NUMERIC_DATE.is_match(&lower) {
        return Some(HeaderMatch::plain("Date header"));
    }

    if DAY_OPENER.is_match(cleaned) {
        return Some(HeaderMatch::plain("Day of week"));
    }

    if HEADER_KEYWORDS.iter().any(|kw| is_keyword_segment(cleaned, kw)) {
        return Some(HeaderMatch::plain("Header keyword"));
    }

    if is_all_caps(text) {
        return Some(HeaderMatch::plain("All caps"));
    }

    if text.chars().count() < MAX_COLON_HEADER_CHARS && text.ends_with(':') {
        return Some(HeaderMatch::plain("Colon-terminated"));
    }

    if ROMAN_NUMERAL.is_match(text) {
        return Some(HeaderMatch::plain("Roman numeral"));
    }

    None
}

/// Whole segment, or `kw:` / `kw -` followed by a digit-free remainder
///
/// A remainder with digits ("Office hours: Mondays 2-4pm") carries
/// content rather than a heading title.
fn is_keyword_segment(cleaned: &str, keyword: &str) -> bool {
    if cleaned == keyword {
        return true;
    }

    let Some(rest) = cleaned.strip_prefix(keyword) else {
        return false;
    };
    let remainder = if let Some(r) = rest.strip_prefix(':') {
        r
    } else if let Some(r) = rest.strip_prefix(" -") {
        r
    } else {
        return false;
    };

    !remainder.chars().any(|c| c.is_ascii_digit())
}

fn is_all_caps(text: &str) -> bool {
    let len = text.chars().count();
    if !(MIN_ALL_CAPS_CHARS..MAX_ALL_CAPS_CHARS).contains(&len) {
        return false;
    }

    let mut has_cased = false;
    for c in text.chars().filter(|c| *c != ' ') {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
