//! Persisted batch progress
//!
//! Run lifecycle: NOT_STARTED → RUNNING → {PAUSED, COMPLETE};
//! PAUSED → RUNNING → {PAUSED, COMPLETE}. Only an explicit reset returns a
//! document to NOT_STARTED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Batch run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Paused,
    Complete,
}

impl RunStatus {
    /// States from which a fresh pass starts over at index 0
    pub fn restarts_from_beginning(&self) -> bool {
        matches!(self, RunStatus::NotStarted | RunStatus::Complete)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::NotStarted => "NOT_STARTED",
            RunStatus::Running => "RUNNING",
            RunStatus::Paused => "PAUSED",
            RunStatus::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

/// Link counters for a document
///
/// `web_links` and `matched_existing` break down `linked`; they are not
/// added on top of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkStatistics {
    pub citations_seen: usize,
    pub linked: usize,
    pub not_found: usize,
    pub web_links: usize,
    pub matched_existing: usize,
}

/// Borderline item queued for manual review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainItem {
    pub index: usize,
    /// Source line, for finding the item in the document
    #[serde(default)]
    pub line: usize,
    pub text: String,
    pub score: i32,
    pub reasons: Vec<String>,
    pub section_marker: Option<String>,
}

/// Durable progress of one document's batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    /// Identifies the run in logs; kept until reset
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Next unprocessed item index
    pub current_index: usize,
    /// Every index already handled, for idempotent skip
    pub processed_indices: BTreeSet<usize>,
    pub statistics: LinkStatistics,
    pub uncertain_items: Vec<UncertainItem>,
    /// Last structural heading context, e.g. "Week 3"
    pub current_section_marker: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::NotStarted,
            current_index: 0,
            processed_indices: BTreeSet::new(),
            statistics: LinkStatistics::default(),
            uncertain_items: Vec::new(),
            current_section_marker: None,
            updated_at: Utc::now(),
        }
    }
}

impl ProgressState {
    /// Transition to new status, returning the previous one
    pub fn transition_to(&mut self, new_status: RunStatus) -> RunStatus {
        let old_status = self.status;
        self.status = new_status;
        self.updated_at = Utc::now();

        if old_status != new_status {
            tracing::debug!(
                run_id = %self.run_id,
                from = %old_status,
                to = %new_status,
                "Progress status transition"
            );
        }

        old_status
    }

    pub fn is_processed(&self, index: usize) -> bool {
        self.processed_indices.contains(&index)
    }

    /// Record an index as handled and advance the checkpoint past it
    pub fn mark_processed(&mut self, index: usize) {
        self.processed_indices.insert(index);
        if index + 1 > self.current_index {
            self.current_index = index + 1;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_empty() {
        let state = ProgressState::default();
        assert_eq!(state.status, RunStatus::NotStarted);
        assert_eq!(state.current_index, 0);
        assert!(state.processed_indices.is_empty());
        assert!(state.uncertain_items.is_empty());
        assert_eq!(state.statistics, LinkStatistics::default());
    }

    #[test]
    fn test_mark_processed_advances_monotonically() {
        let mut state = ProgressState::default();
        state.mark_processed(4);
        assert_eq!(state.current_index, 5);
        state.mark_processed(2);
        assert_eq!(state.current_index, 5);
        assert!(state.is_processed(2));
        assert!(!state.is_processed(3));
    }

    #[test]
    fn test_transition_returns_previous() {
        let mut state = ProgressState::default();
        assert_eq!(state.transition_to(RunStatus::Running), RunStatus::NotStarted);
        assert_eq!(state.transition_to(RunStatus::Paused), RunStatus::Running);
        assert_eq!(state.status, RunStatus::Paused);
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let state: ProgressState =
            serde_json::from_str(r#"{"status":"PAUSED","current_index":12}"#).unwrap();
        assert_eq!(state.status, RunStatus::Paused);
        assert_eq!(state.current_index, 12);
        assert!(state.processed_indices.is_empty());
    }

    #[test]
    fn test_restart_states() {
        assert!(RunStatus::NotStarted.restarts_from_beginning());
        assert!(RunStatus::Complete.restarts_from_beginning());
        assert!(!RunStatus::Paused.restarts_from_beginning());
        assert!(!RunStatus::Running.restarts_from_beginning());
    }
}
