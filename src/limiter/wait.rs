use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::WaitError;

use super::{ByteCount, CacheLimiter, Reservation};

impl CacheLimiter {
    /// Add `count` bytes, waiting until there is room for them or `cancel` fires.
    ///
    /// `use_relaxed_limit` is called before every attempt, so callers can change which limit
    /// applies while waiting (e.g. after waiting for a long time). It should be cheap.
    ///
    /// Between attempts this sleeps for a random duration of up to the configured maximum
    /// backoff (two seconds by default). Waiters are not woken in any particular order.
    ///
    /// Returns [WaitError::Cancelled] if `cancel` fires first, in which case nothing was added.
    pub async fn wait_until_add(
        &self,
        cancel: &CancellationToken,
        count: ByteCount,
        use_relaxed_limit: impl Fn() -> bool,
    ) -> Result<(), WaitError> {
        let mut attempts: u32 = 0;
        loop {
            if self.try_add(count, use_relaxed_limit()) {
                if attempts > 0 {
                    debug!(count, attempts, "Added bytes after waiting");
                }
                return Ok(());
            }
            attempts = attempts.saturating_add(1);

            let backoff = self.backoff();
            trace!(count, in_use = self.in_use(), ?backoff, "No room for bytes, backing off");

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(count, attempts, "Wait for room cancelled");
                    return Err(WaitError::Cancelled);
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// Reserve `count` bytes, waiting until there is room for them or `cancel` fires.
    ///
    /// See [wait_until_add](CacheLimiter::wait_until_add).
    pub async fn reserve(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        count: ByteCount,
        use_relaxed_limit: impl Fn() -> bool,
    ) -> Result<Reservation, WaitError> {
        self.wait_until_add(cancel, count, use_relaxed_limit).await?;
        Ok(self.mint_reservation(count))
    }

    /// A random delay in `[0, max_backoff)`.
    ///
    /// Randomised so that waiters don't all retry at once.
    fn backoff(&self) -> Duration {
        if self.max_backoff.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..self.max_backoff)
    }
}
