//! Poll-and-diff watcher for content the host never notifies about.
//!
//! Radio streams change track and live TV changes programme without any
//! notification, so the monitor re-reads a label every interval and publishes
//! when it differs from the last value it saw.  The loop ends when the target
//! stops being live or the token is cancelled, whichever comes first.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait PollTarget: Send + Sync {
    fn name(&self) -> &'static str;
    /// Liveness predicate, e.g. "audio is still playing".
    async fn is_live(&self) -> bool;
    async fn read(&self) -> String;
    /// Whether a changed value should be published at all.
    fn accepts(&self, _value: &str) -> bool {
        true
    }
    async fn publish(&self, value: &str);
}

/// Run until the target goes away.  Returns how many changes were published.
pub async fn poll_and_diff(
    target: &dyn PollTarget,
    interval: Duration,
    token: &CancellationToken,
) -> usize {
    let mut last = String::new();
    let mut published = 0;

    while !token.is_cancelled() && target.is_live().await {
        let current = target.read().await;
        if current != last && target.accepts(&current) {
            tracing::debug!("{}: {:?} → {:?}", target.name(), last, current);
            last = current;
            published += 1;
            target.publish(&last).await;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    published
}
