//! Resumable batch engine
//!
//! Walks a document's items in index order, classifies each one and links
//! readings. Work is checkpointed every `check_stride` items; when the
//! invocation has used up its time budget the run pauses at a checkpoint and
//! asks the scheduler for a continuation. A later invocation reloads the
//! saved state and carries on. Items are never split across invocations and
//! processed indices are never handled twice.

pub mod ports;

use citelink_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{
    Item, ItemKind, LinkStatistics, ProgressState, RunStatus, UncertainItem,
};
use crate::services::classifier::classify;
use crate::services::normalizer::repair_pdf_text;
use crate::services::resolver::CitationResolver;
use crate::services::shortcuts::{extract_url, LibraryIndex};
pub use ports::{Clock, LinkSink, MemoryProgressStore, ProgressStore, Scheduler, WallClock};

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Work time allowed per invocation
    pub budget: Duration,
    /// Items between checkpoints and budget checks
    pub check_stride: usize,
    /// Delay before a paused run continues
    pub continuation_delay: Duration,
    /// Pause after each resolution that went to the network
    pub resolution_spacing: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(330),
            check_stride: 5,
            continuation_delay: Duration::from_secs(30),
            resolution_spacing: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.budget.is_zero() {
            return Err(Error::Config("Engine budget must be greater than zero".to_string()));
        }
        if self.check_stride == 0 {
            return Err(Error::Config("Check stride must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// PAUSED or COMPLETE
    pub status: RunStatus,
    pub statistics: LinkStatistics,
    pub uncertain_items: Vec<UncertainItem>,
    /// Delay of the scheduled continuation when paused
    pub continuation: Option<Duration>,
}

impl BatchOutcome {
    fn from_state(state: &ProgressState, continuation: Option<Duration>) -> Self {
        Self {
            status: state.status,
            statistics: state.statistics.clone(),
            uncertain_items: state.uncertain_items.clone(),
            continuation,
        }
    }
}

/// Batch engine over injected collaborators
pub struct BatchEngine {
    config: EngineConfig,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn LinkSink>,
    resolver: Arc<dyn CitationResolver>,
    library: Option<Arc<LibraryIndex>>,
}

impl BatchEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ProgressStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn LinkSink>,
        resolver: Arc<dyn CitationResolver>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            scheduler,
            sink,
            resolver,
            library: None,
        }
    }

    /// Match readings against documents the user already holds
    pub fn with_library(mut self, library: Arc<LibraryIndex>) -> Self {
        self.library = Some(library);
        self
    }

    /// Saved progress, or defaults when none is readable
    pub async fn progress(&self) -> ProgressState {
        match self.store.load().await {
            Ok(Some(state)) => state,
            Ok(None) => ProgressState::default(),
            Err(e) => {
                warn!(error = %e, "Saved progress unreadable; using defaults");
                ProgressState::default()
            }
        }
    }

    /// Process items until done or out of budget
    pub async fn run_batch(&self, items: &[Item]) -> Result<BatchOutcome> {
        self.config.validate()?;

        let mut state = self.progress().await;

        if state.status.restarts_from_beginning() {
            state.current_index = 0;
        }
        let start_index = state.current_index;

        state.transition_to(RunStatus::Running);
        info!(
            run_id = %state.run_id,
            start_index,
            items = items.len(),
            already_processed = state.processed_indices.len(),
            "Batch run starting"
        );

        let pending: Vec<&Item> = items
            .iter()
            .filter(|item| item.index >= start_index && !state.is_processed(item.index))
            .collect();

        let mut since_checkpoint = 0;
        for (position, item) in pending.iter().enumerate() {
            self.process_item(item, &mut state).await;
            state.mark_processed(item.index);
            since_checkpoint += 1;

            if since_checkpoint < self.config.check_stride {
                continue;
            }
            since_checkpoint = 0;

            self.store.save(&state).await?;
            debug!(current_index = state.current_index, "Checkpoint saved");

            let remaining = pending.len() - position - 1;
            let elapsed = self.clock.elapsed();
            if remaining > 0 && elapsed >= self.config.budget {
                return self.pause(&mut state, elapsed, remaining).await;
            }
        }

        state.transition_to(RunStatus::Complete);
        self.store.save(&state).await?;
        self.scheduler.cancel_pending();

        info!(
            run_id = %state.run_id,
            citations = state.statistics.citations_seen,
            linked = state.statistics.linked,
            not_found = state.statistics.not_found,
            uncertain = state.uncertain_items.len(),
            "Batch run complete"
        );

        Ok(BatchOutcome::from_state(&state, None))
    }

    /// Forget all progress and any pending continuation
    pub async fn reset(&self) -> Result<()> {
        self.scheduler.cancel_pending();
        self.store.clear().await?;
        info!("Progress reset");
        Ok(())
    }

    async fn pause(
        &self,
        state: &mut ProgressState,
        elapsed: Duration,
        remaining: usize,
    ) -> Result<BatchOutcome> {
        state.transition_to(RunStatus::Paused);
        self.store.save(state).await?;

        let delay = self.config.continuation_delay;
        self.scheduler.schedule_resume(delay)?;

        info!(
            run_id = %state.run_id,
            current_index = state.current_index,
            remaining,
            elapsed_secs = elapsed.as_secs_f64(),
            resume_in_secs = delay.as_secs(),
            "Budget exhausted; batch paused"
        );

        Ok(BatchOutcome::from_state(state, Some(delay)))
    }

    async fn process_item(&self, item: &Item, state: &mut ProgressState) {
        let text = repair_pdf_text(&item.raw_text);
        let classification = classify(&text);

        debug!(
            index = item.index,
            kind = %classification.kind,
            score = classification.score,
            "Item classified"
        );

        match classification.kind {
            ItemKind::Reading => {
                state.statistics.citations_seen += 1;
                self.link_reading(item, &text, &mut state.statistics).await;
            }
            ItemKind::Uncertain => {
                state.uncertain_items.push(UncertainItem {
                    index: item.index,
                    line: item.line,
                    text,
                    score: classification.score,
                    reasons: classification.reasons,
                    section_marker: state.current_section_marker.clone(),
                });
            }
            ItemKind::Header => {
                if let Some(marker) = classification.section_marker {
                    state.current_section_marker = Some(marker);
                }
            }
            ItemKind::Instruction | ItemKind::TooShort | ItemKind::Other => {}
        }
    }

    async fn link_reading(&self, item: &Item, text: &str, stats: &mut LinkStatistics) {
        if let Some(url) = extract_url(text) {
            if self.attach(item, &url).await {
                stats.linked += 1;
                stats.web_links += 1;
            } else {
                stats.not_found += 1;
            }
            return;
        }

        if let Some(entry) = self.library.as_ref().and_then(|lib| lib.best_match(text)) {
            debug!(index = item.index, name = %entry.name, "Matched existing document");
            if self.attach(item, &entry.link).await {
                stats.linked += 1;
                stats.matched_existing += 1;
            } else {
                stats.not_found += 1;
            }
            return;
        }

        let resolved = self.resolver.resolve_keyed(&item.normalized_hash, text).await;

        if !resolved.from_cache && !self.config.resolution_spacing.is_zero() {
            tokio::time::sleep(self.config.resolution_spacing).await;
        }

        let linked = match resolved.result.url.as_deref() {
            Some(url) if resolved.result.success => self.attach(item, url).await,
            _ => false,
        };

        if linked {
            stats.linked += 1;
        } else {
            stats.not_found += 1;
        }
    }

    async fn attach(&self, item: &Item, url: &str) -> bool {
        match self.sink.attach_link(item, url).await {
            Ok(()) => true,
            Err(e) => {
                warn!(index = item.index, url = %url, error = %e, "Failed to attach link");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolutionResult;
    use crate::services::resolver::Resolved;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Each `elapsed` call advances by one step
    struct StepClock {
        step: Duration,
        ticks: AtomicUsize,
    }

    impl Clock for StepClock {
        fn elapsed(&self) -> Duration {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            self.step * n as u32
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<Duration>>,
        cancels: AtomicUsize,
    }

    impl Scheduler for RecordingScheduler {
        fn schedule_resume(&self, delay: Duration) -> Result<()> {
            self.scheduled.lock().unwrap().push(delay);
            Ok(())
        }

        fn cancel_pending(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        links: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl LinkSink for RecordingSink {
        async fn attach_link(&self, item: &Item, url: &str) -> Result<()> {
            self.links.lock().unwrap().push((item.index, url.to_string()));
            Ok(())
        }
    }

    /// Links everything containing "linkable"
    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CitationResolver for FakeResolver {
        async fn resolve_keyed(&self, _key: &str, citation_text: &str) -> Resolved {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if citation_text.contains("linkable") {
                ResolutionResult::found("fake", "https://x/a.pdf", vec!["fake".into()])
            } else {
                ResolutionResult::not_found(vec!["fake".into()])
            };
            Resolved {
                result,
                from_cache: false,
            }
        }
    }

    struct Harness {
        store: Arc<MemoryProgressStore>,
        scheduler: Arc<RecordingScheduler>,
        sink: Arc<RecordingSink>,
        resolver: Arc<FakeResolver>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryProgressStore::new()),
                scheduler: Arc::new(RecordingScheduler::default()),
                sink: Arc::new(RecordingSink::default()),
                resolver: Arc::new(FakeResolver::default()),
            }
        }

        fn engine(&self, config: EngineConfig, step: Duration) -> BatchEngine {
            BatchEngine::new(
                config,
                self.store.clone(),
                Arc::new(StepClock {
                    step,
                    ticks: AtomicUsize::new(0),
                }),
                self.scheduler.clone(),
                self.sink.clone(),
                self.resolver.clone(),
            )
        }
    }

    fn config(budget_secs: u64, stride: usize) -> EngineConfig {
        EngineConfig {
            budget: Duration::from_secs(budget_secs),
            check_stride: stride,
            continuation_delay: Duration::from_secs(30),
            resolution_spacing: Duration::ZERO,
        }
    }

    fn readings(n: usize) -> Vec<Item> {
        Item::from_texts((0..n).map(|i| {
            format!("Author{}, Alex (2001). A linkable study of topic {}. Oxford University Press.", i, i)
        }))
    }

    #[tokio::test]
    async fn test_zero_budget_rejected_before_store_is_touched() {
        let harness = Harness::new();
        let engine = harness.engine(config(0, 5), Duration::from_secs(1));

        let err = engine.run_batch(&readings(3)).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(harness.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_stride_rejected() {
        let harness = Harness::new();
        let engine = harness.engine(config(10, 0), Duration::from_secs(1));
        assert!(matches!(
            engine.run_batch(&readings(3)).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_completes_within_budget() {
        let harness = Harness::new();
        let engine = harness.engine(config(1000, 2), Duration::from_secs(1));

        let outcome = engine.run_batch(&readings(5)).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.continuation, None);
        assert_eq!(outcome.statistics.citations_seen, 5);
        assert_eq!(outcome.statistics.linked, 5);
        assert_eq!(harness.sink.links.lock().unwrap().len(), 5);
        assert_eq!(harness.scheduler.cancels.load(Ordering::SeqCst), 1);
        assert!(harness.scheduler.scheduled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_and_resume_processes_each_item_once() {
        let harness = Harness::new();
        let items = readings(7);

        // Every budget check reports 100s; budget 150s pauses at the second check
        let first = harness
            .engine(config(150, 2), Duration::from_secs(100))
            .run_batch(&items)
            .await
            .unwrap();
        assert_eq!(first.status, RunStatus::Paused);
        assert_eq!(first.continuation, Some(Duration::from_secs(30)));
        assert_eq!(first.statistics.citations_seen, 4);
        assert_eq!(*harness.scheduler.scheduled.lock().unwrap(), vec![Duration::from_secs(30)]);

        let saved = harness.store.load().await.unwrap().unwrap();
        assert_eq!(saved.status, RunStatus::Paused);
        assert_eq!(saved.current_index, 4);

        let second = harness
            .engine(config(1000, 2), Duration::from_secs(1))
            .run_batch(&items)
            .await
            .unwrap();
        assert_eq!(second.status, RunStatus::Complete);
        assert_eq!(second.statistics.citations_seen, 7);
        assert_eq!(harness.resolver.calls.load(Ordering::SeqCst), 7);

        let linked: Vec<usize> = harness.sink.links.lock().unwrap().iter().map(|(i, _)| *i).collect();
        assert_eq!(linked, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_rerun_after_complete_is_noop() {
        let harness = Harness::new();
        let items = readings(3);

        let first = harness
            .engine(config(1000, 5), Duration::from_secs(1))
            .run_batch(&items)
            .await
            .unwrap();
        let second = harness
            .engine(config(1000, 5), Duration::from_secs(1))
            .run_batch(&items)
            .await
            .unwrap();

        assert_eq!(second.status, RunStatus::Complete);
        assert_eq!(second.statistics, first.statistics);
        assert_eq!(harness.resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_pause_when_nothing_remains() {
        let harness = Harness::new();
        let outcome = harness
            .engine(config(1, 2), Duration::from_secs(100))
            .run_batch(&readings(2))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn test_reset_clears_and_cancels() {
        let harness = Harness::new();
        let engine = harness.engine(config(1000, 5), Duration::from_secs(1));
        engine.run_batch(&readings(2)).await.unwrap();

        engine.reset().await.unwrap();

        assert!(harness.store.load().await.unwrap().is_none());
        assert_eq!(harness.scheduler.cancels.load(Ordering::SeqCst), 2);
        assert_eq!(engine.progress().await.status, RunStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_mixed_document() {
        let harness = Harness::new();
        let engine = harness.engine(config(1000, 5), Duration::from_secs(1));
        let items = Item::from_texts([
            "Week 3: Inequality",
            "Office hours: Mondays 2-4pm, Room 305",
            "Harvey on the condition of postmodernity",
            "Smith, John (2020). The Theory of Everything. New York: Oxford University Press, pp. 1-25.",
            "Jones, Ann (2019). Online essay on markets. https://example.org/essay.",
        ]);

        let outcome = engine.run_batch(&items).await.unwrap();

        assert_eq!(outcome.statistics.citations_seen, 2);
        assert_eq!(outcome.statistics.not_found, 1);
        assert_eq!(outcome.statistics.linked, 1);
        assert_eq!(outcome.statistics.web_links, 1);
        assert_eq!(outcome.uncertain_items.len(), 1);
        assert_eq!(outcome.uncertain_items[0].index, 2);
        assert_eq!(outcome.uncertain_items[0].section_marker.as_deref(), Some("Week 3"));
        // The URL citation never reaches the resolver
        assert_eq!(harness.resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *harness.sink.links.lock().unwrap(),
            vec![(4, "https://example.org/essay".to_string())]
        );
    }

    #[tokio::test]
    async fn test_library_match_counts_as_existing() {
        let harness = Harness::new();
        let library = LibraryIndex::new(vec![crate::services::shortcuts::LibraryEntry {
            name: "Smith Theory of Everything.pdf".into(),
            link: "file:///lib/smith.pdf".into(),
        }]);
        let engine = harness
            .engine(config(1000, 5), Duration::from_secs(1))
            .with_library(Arc::new(library));

        let items = Item::from_texts([
            "Smith, John (2020). The Theory of Everything. New York: Oxford University Press, pp. 1-25.",
        ]);
        let outcome = engine.run_batch(&items).await.unwrap();

        assert_eq!(outcome.statistics.linked, 1);
        assert_eq!(outcome.statistics.matched_existing, 1);
        assert_eq!(harness.resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolver_caches_under_item_hash() {
        use crate::services::cache::{MemoryResultCache, ResultCache, DEFAULT_CACHE_TTL};
        use crate::services::normalizer::key_for;
        use crate::services::resolver::Resolver;

        let cache = Arc::new(MemoryResultCache::new());
        let harness = Harness::new();
        let engine = BatchEngine::new(
            config(1000, 5),
            harness.store.clone(),
            Arc::new(StepClock {
                step: Duration::from_secs(1),
                ticks: AtomicUsize::new(0),
            }),
            harness.scheduler.clone(),
            harness.sink.clone(),
            Arc::new(Resolver::new(cache.clone(), DEFAULT_CACHE_TTL)),
        );

        // Hyphenated line break: the raw and repaired texts normalize differently
        let raw = "Smith, John (2020). The theo- ry of everything. New York: Oxford University Press, pp. 1-25.";
        let items = Item::from_texts([raw]);
        assert_ne!(items[0].normalized_hash, key_for(raw));

        let outcome = engine.run_batch(&items).await.unwrap();
        assert_eq!(outcome.statistics.not_found, 1);

        let entry = cache.get(&items[0].normalized_hash).await.unwrap();
        assert!(entry.is_some_and(|e| e.is_negative()));
    }
}
