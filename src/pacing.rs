//! Rate-limit pacing and settle waits for remote calls.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::PacingConfig;

/// Delays the remote handle inserts around calls.
#[async_trait]
pub trait Pacing: Send + Sync {
    /// Wait before a remote call.
    async fn pace(&self);

    /// Wait for recent changes to show up remotely. `attempt` counts
    /// re-reads of the same listing, starting at 0.
    async fn settle(&self, attempt: u32);
}

/// Fixed call spacing and a settle delay that doubles per attempt.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    call: Duration,
    settle: Duration,
}

impl FixedDelay {
    pub fn new(call: Duration, settle: Duration) -> Self {
        Self { call, settle }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.call_delay_ms),
            Duration::from_secs(config.settle_delay_secs),
        )
    }

    pub fn settle_delay(&self, attempt: u32) -> Duration {
        self.settle.saturating_mul(1 << attempt.min(6))
    }
}

#[async_trait]
impl Pacing for FixedDelay {
    async fn pace(&self) {
        if !self.call.is_zero() {
            tokio::time::sleep(self.call).await;
        }
    }

    async fn settle(&self, attempt: u32) {
        let delay = self.settle_delay(attempt);
        if !delay.is_zero() {
            log::info!("Waiting {}s for Flickr to settle", delay.as_secs_f32());
            tokio::time::sleep(delay).await;
        }
    }
}

/// No waiting at all. For tests and the in-memory service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Pacing for NoDelay {
    async fn pace(&self) {}

    async fn settle(&self, _attempt: u32) {}
}
