//! Re-invocation delay policy for in-progress results

use ossindex_core::config::ReconcilerConfig;
use std::time::Duration;

/// Exponential backoff with a cap
///
/// The cap must stay under the platform's maximum single-invocation
/// duration; the recommended delay is advisory and the reconciler stays
/// correct if the caller re-invokes earlier or later.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.base_delay_secs),
            Duration::from_secs(config.max_delay_secs),
        )
    }

    /// Recommended delay before the next poll in the same phase
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let secs = self.base.as_secs().saturating_mul(1u64 << exp);
        Duration::from_secs(secs.min(self.cap.as_secs()))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&ReconcilerConfig::default())
    }
}
