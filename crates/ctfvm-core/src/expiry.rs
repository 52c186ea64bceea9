//! Cancellable per-workload countdowns.
//!
//! A timer only decides *when* to try a teardown. Whether the teardown still
//! applies is settled by the fire callback under the key's exclusive section:
//! it acts only if the registry still holds the record armed with this
//! timer's id.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ExpiryScheduler {
    ttl: Duration,
}

impl ExpiryScheduler {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Spawn a countdown that calls `fire` with the timer id after the TTL,
    /// unless the returned handle is cancelled or dropped first.
    pub fn arm<F, Fut>(&self, fire: F) -> ExpiryTimer
    where
        F: FnOnce(Uuid) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let deadline = Instant::now() + self.ttl;

        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    trace!(timer = %id, "expiry timer cancelled");
                }
                _ = tokio::time::sleep_until(deadline) => {
                    trace!(timer = %id, "expiry timer fired");
                    fire(id).await;
                }
            }
        });

        ExpiryTimer { id, token }
    }
}

/// Handle to an armed countdown. Dropping it cancels the countdown.
#[derive(Debug)]
pub struct ExpiryTimer {
    id: Uuid,
    token: CancellationToken,
}

impl ExpiryTimer {
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop the countdown if it is still sleeping. Has no effect on a fire
    /// callback that is already running.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn token_for_tests(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
