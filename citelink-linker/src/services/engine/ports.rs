//! Collaborators injected into the batch engine

use async_trait::async_trait;
use citelink_common::Result;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::models::{Item, ProgressState};

/// Durable per-document progress
///
/// `load` returns `Ok(None)` when nothing was saved and an error when saved
/// state cannot be read back; the engine treats both as a fresh start.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self) -> Result<Option<ProgressState>>;
    async fn save(&self, state: &ProgressState) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Time spent in the current invocation
pub trait Clock: Send + Sync {
    fn elapsed(&self) -> Duration;
}

/// Arranges for a paused batch to be picked up again
pub trait Scheduler: Send + Sync {
    /// Replace any pending continuation with one firing after `delay`
    fn schedule_resume(&self, delay: Duration) -> Result<()>;

    fn cancel_pending(&self);
}

/// Records a resolved link against its item
#[async_trait]
pub trait LinkSink: Send + Sync {
    async fn attach_link(&self, item: &Item, url: &str) -> Result<()>;
}

/// Wall-clock time since construction
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Progress held in memory only
#[derive(Default)]
pub struct MemoryProgressStore {
    state: RwLock<Option<ProgressState>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self) -> Result<Option<ProgressState>> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &ProgressState) -> Result<()> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryProgressStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut state = ProgressState::default();
        state.transition_to(RunStatus::Paused);
        state.mark_processed(3);
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(state));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn test_wall_clock_advances() {
        let clock = WallClock::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.elapsed() >= Duration::from_millis(5));
    }
}
