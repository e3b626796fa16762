//! Classifier rule tables
//!
//! Weights are tuned values and are kept exactly as they are; the asymmetry
//! between instruction and reading penalties is intentional.

use once_cell::sync::Lazy;
use regex::Regex;

/// Weight of strong instruction openers and strong citation shapes
pub const STRONG: i32 = 3;
/// Weight of medium instruction signals
pub const INSTRUCTION_MEDIUM: i32 = 2;
/// Weight of weak instruction signals and medium bibliographic signals
pub const WEAK: i32 = 1;
/// Weight of course-description phrasing as an instruction signal
pub const COURSE_DESCRIPTION: i32 = 4;
/// Bonus when the text opens with an author-name shape
pub const AUTHOR_START_BONUS: i32 = 2;
/// Bonus for readings longer than `LENGTH_BONUS_CHARS`
pub const LENGTH_BONUS: i32 = 1;
/// Character count above which the length bonus applies
pub const LENGTH_BONUS_CHARS: usize = 80;

/// One weighted pattern
#[derive(Debug)]
pub struct Rule {
    pub pattern: Regex,
    pub weight: i32,
    pub label: &'static str,
}

impl Rule {
    fn new(pattern: &str, weight: i32, label: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("classifier rule pattern must compile"),
            weight,
            label,
        }
    }

    /// Reason string recorded when the rule fires, e.g. "+3 Author (Year)"
    pub fn reason(&self) -> String {
        format!("{:+} {}", self.weight, self.label)
    }
}

/// Course-description phrasing shared by instruction scoring
const COURSE_DESCRIPTION_PATTERN: &str = r"(?i)\bthis course\b|\bthe course\b|\bthis class\b|\bthe class\b|\bthis seminar\b|\bstudents will\b|\bstudents learn\b|\bstudents are\b|\bwe will\b|\bwe explore\b|\bwe examine\b|\byou will\b|\byou learn\b|\bintroduces students\b|\bdesigned to\b|\bpurpose of this\b|\bgoal of this\b|\baims to\b|\bseeks to\b|\bfocuses on\b|\bexplores\b.*\bthrough\b|\bexamines\b.*\bthrough\b|\baddresses\b.*\bquestions?\b|\bwhat is\b.*\?\s*what\b|\bwhat are\b.*\?|\bhow do\b.*\?|\bwhy do\b.*\?";

/// Instruction rules, evaluated in order on bullet-stripped text
pub static INSTRUCTION_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(COURSE_DESCRIPTION_PATTERN, COURSE_DESCRIPTION, "Course description"),
        // Strong openers
        Rule::new(
            r"(?i)^(read|write|submit|complete|prepare|review|discuss|bring|post|upload|email|send)\s",
            STRONG,
            "Imperative verb start",
        ),
        Rule::new(
            r"(?i)^(please\b|note:|note that\b|you should\b|you will\b|you must\b)",
            STRONG,
            "Polite instruction",
        ),
        Rule::new(
            r"(?i)^(students will|students should|students must)\b",
            STRONG,
            "Student directive",
        ),
        Rule::new(
            r"(?i)^(be prepared|come prepared|make sure|don't forget|remember to)\b",
            STRONG,
            "Preparation instruction",
        ),
        Rule::new(
            r"(?i)^(assignment|homework|essay|paper due|exam|quiz|midterm|final)\b",
            STRONG,
            "Assignment/exam",
        ),
        Rule::new(
            r"(?i)^(no class|class canceled|class cancelled)\b",
            STRONG,
            "Class cancellation",
        ),
        // Medium signals
        Rule::new(r"(?i)\boffice\s*hours?\b", INSTRUCTION_MEDIUM, "Office hours"),
        Rule::new(
            r"\d{1,2}:\d{2}\s*[-\u{2013}to]+\s*\d{1,2}:\d{2}",
            INSTRUCTION_MEDIUM,
            "Time range",
        ),
        Rule::new(
            r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\s+\d",
            INSTRUCTION_MEDIUM,
            "Day + time",
        ),
        Rule::new(
            r"(?i)\b(due|submit|by|before)\s*(:|on|by)?\s*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec|\d{1,2}/)",
            INSTRUCTION_MEDIUM,
            "Due date",
        ),
        Rule::new(
            r"(?i)\b\d+\s*(%|percent\b|points?\b)",
            INSTRUCTION_MEDIUM,
            "Grading info",
        ),
        Rule::new(
            r"(?i)\b(grade|grading|evaluation|attendance|participation)\b",
            INSTRUCTION_MEDIUM,
            "Assessment term",
        ),
        Rule::new(
            r"(?i)\b(on canvas|on blackboard|on moodle|on courseworks|course reserve)\b",
            INSTRUCTION_MEDIUM,
            "LMS reference",
        ),
        Rule::new(
            r"(?i)\b(in person|in-person|zoom|virtual|hybrid)\b",
            INSTRUCTION_MEDIUM,
            "Meeting format",
        ),
        Rule::new(
            r"(?i)\b(film screening\b|listen to\b|movie:|watch:|view:)",
            INSTRUCTION_MEDIUM,
            "Media instruction",
        ),
        Rule::new(
            r"(?i)\b(response paper|reflection|blog post|discussion post|group project|presentation)\b",
            INSTRUCTION_MEDIUM,
            "Assignment type",
        ),
        // Weak signals
        Rule::new(
            r"(?i)\b(tba|tbd|to be announced|to be determined)\b",
            WEAK,
            "TBA/TBD",
        ),
        Rule::new(
            r"(?i)\b(see |refer to\b|check |visit )",
            WEAK,
            "Reference directive",
        ),
        Rule::new(
            r"(?i)\b(available on|available at|posted on)\b",
            WEAK,
            "Availability info",
        ),
        Rule::new(
            r"(?i)\b(professor |prof\.|prof |dr\.|dr |instructor:)",
            WEAK,
            "Instructor reference",
        ),
        Rule::new(
            r"(?i)\b(classroom\b|room |location:|class time\b|meeting time\b)",
            WEAK,
            "Location/time info",
        ),
        Rule::new(
            r"(?i)\b(this week|this class|today we|we will|we are)\b",
            WEAK,
            "Class activity",
        ),
        Rule::new(
            r"(?i)\b(in class|for class|before class|after class)\b",
            WEAK,
            "Class context",
        ),
        // Citation-looking text argues against an instruction
        Rule::new(
            r"^[A-Z][a-z]+(?:\s+(?:and|&)\s+[A-Z][a-z]+)?\s*[(,]\s*\d{4}",
            -3,
            "Author (Year) format",
        ),
        Rule::new(r"(?i)\bpp?\.?\s*\d+[-\u{2013}]?\d*", -2, "Page numbers"),
        Rule::new(
            r"(?i)\b(journal|quarterly|review|studies|proceedings)\s+of\b",
            -2,
            "Academic journal",
        ),
        Rule::new(
            r"(?i)\b(university press|oxford|cambridge|routledge|sage|springer)\b",
            -2,
            "Publisher name",
        ),
        Rule::new(r"(?i)\b(isbn|doi)\b|doi\.org", -2, "Academic identifier"),
    ]
});

/// Reading rules before the author bonus, evaluated in order
pub static READING_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        // Strong citation shapes
        Rule::new(
            r"(?i)^[A-Z][a-z]+(?:\s+(?:and|&)\s+[A-Z][a-z]+)?\s*[(,]\s*\d{4}",
            STRONG,
            "Author (Year)",
        ),
        Rule::new(
            r"(?i)^[A-Z][a-z]+\s+et\s+al\.?\s*[(,]?\s*\d{4}",
            STRONG,
            "Author et al. (Year)",
        ),
        Rule::new(
            r"(?i)^[A-Z][a-z]+,\s*[A-Z][a-z.]+\s*[(,]\s*\d{4}",
            STRONG,
            "Last, First (Year)",
        ),
        Rule::new(
            r#"["\u{201c}][^"\u{201d}]{20,}["\u{201d}]"#,
            STRONG,
            "Quoted title",
        ),
        // Medium bibliographic signals
        Rule::new(r"\(\d{4}\)", WEAK, "Year in parens"),
        Rule::new(r",\s*\d{4}[,.\s$]", WEAK, "Year after comma"),
        Rule::new(r"(?i)pp?\.?\s*\d+[-\u{2013}]?\d*", WEAK, "Page numbers"),
        Rule::new(r"(?i)vol\.?\s*\d+", WEAK, "Volume"),
        Rule::new(r"(?i)no\.?\s*\d+", WEAK, "Issue number"),
        Rule::new(r"(?i)\bch(?:apter)?\.?\s*\d+", WEAK, "Chapter"),
        Rule::new(
            r#"["'\u{201c}\u{201d}].{15,}["'\u{201c}\u{201d}]"#,
            WEAK,
            "Quoted text",
        ),
        Rule::new(r"(?i)\bed(?:s|ited)?\.?\s*(?:by)?\s*[A-Z]", WEAK, "Editor"),
        Rule::new(
            r"(?i)\btrans(?:lated)?\.?\s*(?:by)?\s*[A-Z]",
            WEAK,
            "Translator",
        ),
        Rule::new(r"(?i)university\s+press", WEAK, "University Press"),
        Rule::new(r"(?i)journal\s+of\s+[A-Z]", WEAK, "Journal of..."),
        Rule::new(
            r"(?i)\b(?:Quarterly|Review|Studies|Bulletin|Proceedings)\s+(?:of\s+)?[A-Z]",
            WEAK,
            "Academic journal",
        ),
        Rule::new(
            r"(?i)\b(?:Oxford|Cambridge|Routledge|Sage|Springer|Wiley|Penguin|Harvard|Yale|Princeton)\b",
            WEAK,
            "Major publisher",
        ),
        Rule::new(r"(?i)\b(?:ISBN|DOI)\b|doi\.org|doi:\s*10\.", WEAK, "Identifier"),
        Rule::new(r"\(\d+\):\s*\d+[-\u{2013}]?\d*", WEAK, "Vol(issue): pages"),
        Rule::new(r"(?i)\bIn:\s+[A-Z][a-z]+", WEAK, "In: anthology"),
        Rule::new(
            r"(?i)\bed\.\s+by\s+[A-Z]|\bedited\s+by\s+[A-Z]",
            WEAK,
            "Edited by",
        ),
        Rule::new(
            r"(?i)excerpts?\s+from|selections?\s+from",
            WEAK,
            "Excerpt/selection",
        ),
    ]
});

/// Reading penalties, evaluated after the author and length bonuses
pub static READING_NEGATIVE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(r"(?i)^(https?://|www\.)\S+$", -2, "URL only"),
        Rule::new(r"(?i)^\d+\s*(%|percent|points?)", -2, "Grading info"),
        Rule::new(
            r"(?i)^(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b",
            -2,
            "Day of week",
        ),
        Rule::new(r"^\d{1,2}[:/]\d{2}", -2, "Time"),
        Rule::new(r"(?i)\bthis course\b", -3, "Course description"),
        Rule::new(r"(?i)\bthe course\b", -3, "Course description"),
        Rule::new(r"(?i)\bthis class\b", -3, "Course description"),
        Rule::new(r"(?i)\bstudents will\b", -3, "Course description"),
        Rule::new(r"(?i)\bstudents learn\b", -3, "Course description"),
        Rule::new(r"(?i)\bwe will\b", -2, "Course description"),
        Rule::new(r"(?i)\boffice hours\b", -3, "Office hours"),
        Rule::new(
            r"\d{1,2}:\d{2}\s*[-\u{2013}]\s*\d{1,2}:\d{2}",
            -2,
            "Time range",
        ),
        Rule::new(r"(?i)\bwhat is\b.*\?", -2, "Question"),
        Rule::new(r"(?i)\bhow do\b.*\?", -2, "Question"),
        Rule::new(r"(?i)\bin person\b", -2, "Meeting format"),
    ]
});

/// Author-name openers; any match earns `AUTHOR_START_BONUS` once
static AUTHOR_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^[A-Z][a-z]+",
        r"^[A-Z]'[A-Z]?[a-z]+",
        r"^(?:van|von|de|del|la|le|du|dos|das)\s+[A-Z]",
        r"^Mc[A-Z][a-z]+",
        r"^Mac[A-Z][a-z]+",
        r"^[A-Z][a-z]+,\s*[A-Z]",
        r"^[A-Z][a-z]+\s+(?:and|&)\s+[A-Z][a-z]+",
        r"^[A-Z][a-z]+\s+et\s+al",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("author shape pattern must compile"))
    .collect()
});

/// Whether the text opens with something shaped like an author name
pub fn looks_like_author(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && AUTHOR_SHAPES.iter().any(|p| p.is_match(text))
}
