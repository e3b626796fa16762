//! In-process continuation scheduler
//!
//! A scheduled continuation is a timer task that sends on the resume
//! channel when it fires. At most one continuation is pending; scheduling a
//! new one or calling `cancel_pending` cancels the previous timer.

use citelink_common::{Error, Result};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::services::engine::Scheduler;

/// Timer-based scheduler signalling on an mpsc channel
pub struct TokioScheduler {
    resume_tx: mpsc::UnboundedSender<()>,
    pending: Mutex<Option<CancellationToken>>,
    /// Cancelling this drops every pending continuation
    shutdown: CancellationToken,
}

impl TokioScheduler {
    /// Scheduler and the receiver its continuations fire on
    pub fn new(shutdown: CancellationToken) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            resume_tx,
            pending: Mutex::new(None),
            shutdown,
        };
        (scheduler, resume_rx)
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_resume(&self, delay: Duration) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("No async runtime for continuation: {}", e)))?;

        let token = self.shutdown.child_token();
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone())
        {
            previous.cancel();
        }

        let resume_tx = self.resume_tx.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Continuation cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    // Mark fired so has_pending reports false
                    token.cancel();
                    if resume_tx.send(()).is_err() {
                        tracing::debug!("Continuation fired with no receiver");
                    }
                }
            }
        });

        tracing::debug!(delay_secs = delay.as_secs_f64(), "Continuation scheduled");
        Ok(())
    }

    fn cancel_pending(&self) {
        if let Some(token) = self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
            tracing::debug!("Pending continuation cancelled");
        }
    }
}
